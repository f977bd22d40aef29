#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use ingress2gateway_core as core;
pub use ingress2gateway_emitter as emitter;
pub use ingress2gateway_ingress_nginx as ingress_nginx;

mod args;
mod output;
mod read;

pub use self::{
    args::Args,
    output::{OutputFormat, UnknownOutputFormat},
};
