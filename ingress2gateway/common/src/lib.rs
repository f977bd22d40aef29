#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Provider-independent conversion of Ingresses into the base Gateway API IR.

mod aggregator;
mod backend;
mod names;

#[cfg(test)]
mod tests;

pub use self::{
    backend::to_backend_ref,
    names::{name_from_host, route_name},
};
use ingress2gateway_core::{
    k8s::{gateway::HttpPathMatch, Ingress},
    BackendSource, ErrorList, ProviderIr, ServicePorts,
};

/// The legacy annotation naming an Ingress' class.
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Maps an `ImplementationSpecific` path to a Gateway API path match. The
/// sources are the Ingress paths that share the path.
pub type ImplementationSpecificPathMatch = fn(&str, &[BackendSource<'_>]) -> HttpPathMatch;

/// Provider hooks for the base IR builder.
#[derive(Clone, Default)]
pub struct Options {
    /// The class assigned to Ingresses that do not name one.
    pub default_ingress_class: String,

    pub implementation_specific_path_match: Option<ImplementationSpecificPathMatch>,
}

/// Builds the base IR for a set of Ingresses.
///
/// Ingress rules sharing a namespace, class and host are merged into one
/// HTTPRoute, and paths sharing a type and value into one rule. Gateways get a
/// listener per host.
pub fn to_ir<'i>(
    ingresses: &'i [Ingress],
    service_ports: &ServicePorts,
    options: &Options,
) -> (ProviderIr<'i>, ErrorList) {
    let mut aggregator = aggregator::Aggregator::default();
    for ingress in ingresses {
        aggregator.add_ingress(ingress, &options.default_ingress_class);
    }
    aggregator.into_ir(service_ports, options)
}

/// Returns the class an Ingress names, if any.
pub fn ingress_class(ingress: &Ingress) -> Option<&str> {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.ingress_class_name.as_deref())
        .or_else(|| {
            ingress
                .metadata
                .annotations
                .as_ref()?
                .get(INGRESS_CLASS_ANNOTATION)
                .map(String::as_str)
        })
        .filter(|class| !class.is_empty())
}
