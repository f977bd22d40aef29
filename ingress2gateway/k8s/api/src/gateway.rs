//! Gateway API resources emitted by the converter.
//!
//! Only the fields the converter produces are modeled.

pub mod backend_lb_policy;
pub mod backend_tls_policy;
pub mod gateways;
pub mod grpcroute;
pub mod httproute;
pub mod references;

pub use self::{
    backend_lb_policy::{BackendLbPolicy, BackendLbPolicySpec, CookieConfig, SessionPersistence},
    backend_tls_policy::{BackendTlsPolicy, BackendTlsPolicySpec, BackendTlsPolicyValidation},
    gateways::{Gateway, GatewaySpec, GatewayTlsConfig, Listener},
    grpcroute::{
        GrpcMethodMatch, GrpcRoute, GrpcRouteFilter, GrpcRouteMatch, GrpcRouteRule, GrpcRouteSpec,
    },
    httproute::{
        HttpAuthConfig, HttpCorsFilter, HttpExternalAuthFilter, HttpHeader, HttpHeaderFilter,
        HttpHeaderMatch, HttpPathMatch, HttpPathModifier, HttpRequestRedirectFilter, HttpRoute,
        HttpRouteFilter, HttpRouteMatch, HttpRouteRule, HttpRouteSpec, HttpRouteTimeouts,
        HttpUrlRewriteFilter,
    },
    references::{
        BackendObjectReference, BackendRef, LocalObjectReference, LocalPolicyTargetReference,
        LocalPolicyTargetReferenceWithSectionName, ParentReference, SecretObjectReference,
    },
};

pub const GROUP: &str = "gateway.networking.k8s.io";
