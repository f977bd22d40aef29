#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod emitter_ir;
pub mod field;
pub mod ir;
pub mod notifications;
mod resource_id;

pub use self::{
    emitter_ir::EmitterIr,
    field::{ErrorList, Path},
    ir::{BackendSource, ProviderIr, ServicePorts},
    notifications::{Notification, NotificationType, Notifications},
    resource_id::{NamespacedName, ObjectRef},
};
pub use ingress2gateway_k8s_api as k8s;
pub use ipnet::IpNet;
