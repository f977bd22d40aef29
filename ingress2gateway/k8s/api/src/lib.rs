#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod duration;
pub mod envoy;
pub mod gateway;

pub use self::duration::GatewayDuration;
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Service, ServicePort, ServiceSpec},
        networking::v1::{
            HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
            IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
        },
    },
    apimachinery::pkg::api::resource::Quantity,
};
pub use kube::{
    core::ObjectMeta,
    Resource, ResourceExt,
};
