//! Annotation projectors, applied in order to the base IR.
//!
//! Order matters: projectors that move or add rules run before the ones that
//! read them, and canary header rules copy the intents of the rule they
//! derive from.

mod affinity;
mod app_root;
mod backend_protocol;
mod backend_tls;
pub(crate) mod body_size;
mod cors;
mod ext_auth;
mod header_modifiers;
mod ip_range;
mod redirect;
mod rewrite;
mod server_alias;
mod ssl_redirect;
pub(crate) mod timeouts;

use crate::{canary, conversion::Feature, policies};

pub(crate) const FEATURES: &[(&str, Feature)] = &[
    ("canary", canary::weights),
    ("backend-protocol", backend_protocol::apply),
    ("header-modifiers", header_modifiers::apply),
    ("server-alias", server_alias::apply),
    ("rewrite", rewrite::apply),
    ("timeouts", timeouts::apply),
    ("body-size", body_size::apply),
    ("cors", cors::apply),
    ("ip-range", ip_range::apply),
    ("policies", policies::collect),
    ("ext-auth", ext_auth::apply),
    ("session-affinity", affinity::apply),
    ("backend-tls", backend_tls::apply),
    ("app-root", app_root::apply),
    ("redirect", redirect::apply),
    ("canary-by-header", canary::by_header),
    ("ssl-redirect", ssl_redirect::apply),
];
