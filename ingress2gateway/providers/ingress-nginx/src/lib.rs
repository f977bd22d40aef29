#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Converts ingress-nginx Ingresses, and the annotations they carry, into
//! Gateway API resources.

pub mod annotations;
mod canary;
mod conversion;
mod features;
mod policies;
mod storage;


pub use self::{
    canary::{get_non_canary_ingress, is_canary},
    conversion::Conversion,
    features::{
        body_size::{convert_nginx_size_to_k8s_quantity, InvalidSize},
        timeouts::{parse_nginx_duration, InvalidDuration},
    },
    policies::{ExtAuthPolicy, Policy, PolicyIndex, SessionAffinityPolicy},
    storage::Storage,
};
use ingress2gateway_common::Options;
use ingress2gateway_core::{k8s::gateway::HttpPathMatch, BackendSource, ErrorList};

/// The provider name used on the command line.
pub const NAME: &str = "ingress-nginx";

/// Converts the Ingresses in `storage`.
///
/// The base IR is built first. If that fails, no annotations are applied and
/// the partial conversion is returned with the errors. Otherwise every feature
/// projector runs in a fixed order.
pub fn to_ir(storage: &Storage) -> (Conversion<'_>, ErrorList) {
    let options = Options {
        default_ingress_class: storage.ingress_class.clone(),
        implementation_specific_path_match: Some(implementation_specific_path_match),
    };
    let (ir, errors) =
        ingress2gateway_common::to_ir(&storage.ingresses, &storage.service_ports, &options);
    let mut conversion = Conversion::new(storage, ir);
    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "Skipping annotations");
        return (conversion, errors);
    }

    let errors = conversion.apply_features();
    (conversion, errors)
}

/// ingress-nginx treats `ImplementationSpecific` paths as regular expressions
/// when the governing Ingress sets `use-regex`, and as prefixes otherwise.
fn implementation_specific_path_match(path: &str, sources: &[BackendSource<'_>]) -> HttpPathMatch {
    let use_regex = get_non_canary_ingress(sources)
        .and_then(|ingress| annotations::get(ingress, annotations::USE_REGEX))
        .and_then(|v| annotations::parse_bool(v).ok())
        .unwrap_or(false);
    let value = path.to_string();
    if use_regex {
        HttpPathMatch::RegularExpression { value }
    } else {
        HttpPathMatch::PathPrefix { value }
    }
}
