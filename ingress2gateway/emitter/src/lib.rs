#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Materializes Gateway API resources from the provider IR.
//!
//! Every target copies the routes, gateways and policies built by the
//! provider and then expresses the rule intents in its own way: the
//! `standard` target with Gateway API filters only, the `envoy-gateway`
//! target with Envoy Gateway policies attached to named route rules.

mod base;
mod envoy;
mod standard;

#[cfg(test)]
mod tests;

pub use self::{envoy::EnvoyGatewayEmitter, standard::StandardEmitter};
use ingress2gateway_core::{
    k8s::{
        envoy::{BackendTrafficPolicy, SecurityPolicy},
        gateway::{BackendLbPolicy, BackendTlsPolicy, Gateway, GrpcRoute, HttpRoute},
    },
    EmitterIr, ErrorList, NamespacedName, Notifications, ProviderIr,
};
use std::{collections::BTreeMap, fmt, str::FromStr};

pub trait Emitter {
    fn emit(
        &self,
        ir: &ProviderIr<'_>,
        intents: &EmitterIr,
        notifications: &mut Notifications,
    ) -> (GatewayResources, ErrorList);
}

/// The resources produced by a conversion, keyed for deterministic output.
#[derive(Clone, Debug, Default)]
pub struct GatewayResources {
    pub gateways: BTreeMap<NamespacedName, Gateway>,
    pub http_routes: BTreeMap<NamespacedName, HttpRoute>,
    pub grpc_routes: BTreeMap<NamespacedName, GrpcRoute>,
    pub backend_tls_policies: BTreeMap<NamespacedName, BackendTlsPolicy>,
    pub backend_lb_policies: BTreeMap<NamespacedName, BackendLbPolicy>,
    pub security_policies: BTreeMap<NamespacedName, SecurityPolicy>,
    pub backend_traffic_policies: BTreeMap<NamespacedName, BackendTrafficPolicy>,
}

/// The emitter selected on the command line.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Target {
    #[default]
    Standard,
    EnvoyGateway,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown emitter {0:?}; expected \"standard\" or \"envoy-gateway\"")]
pub struct UnknownTarget(String);

// === impl GatewayResources ===

impl GatewayResources {
    pub fn len(&self) -> usize {
        self.gateways.len()
            + self.http_routes.len()
            + self.grpc_routes.len()
            + self.backend_tls_policies.len()
            + self.backend_lb_policies.len()
            + self.security_policies.len()
            + self.backend_traffic_policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// === impl Target ===

impl FromStr for Target {
    type Err = UnknownTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "envoy-gateway" => Ok(Self::EnvoyGateway),
            s => Err(UnknownTarget(s.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::EnvoyGateway => "envoy-gateway",
        })
    }
}

impl Emitter for Target {
    fn emit(
        &self,
        ir: &ProviderIr<'_>,
        intents: &EmitterIr,
        notifications: &mut Notifications,
    ) -> (GatewayResources, ErrorList) {
        tracing::debug!(emitter = %self, "Emitting resources");
        match self {
            Self::Standard => StandardEmitter.emit(ir, intents, notifications),
            Self::EnvoyGateway => EnvoyGatewayEmitter.emit(ir, intents, notifications),
        }
    }
}
