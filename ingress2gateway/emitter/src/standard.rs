//! Emits plain Gateway API resources.
//!
//! CORS and external authentication map onto route filters. IP access
//! control, body size limits and connect timeouts have no Gateway API
//! equivalent and are reported instead.

use crate::{base, Emitter, GatewayResources};
use ingress2gateway_core::{
    emitter_ir::{Cors, ExtAuth},
    k8s::gateway::{HttpAuthConfig, HttpCorsFilter, HttpExternalAuthFilter, HttpRouteFilter},
    EmitterIr, ErrorList, Notifications, ProviderIr,
};

#[derive(Copy, Clone, Debug, Default)]
pub struct StandardEmitter;

impl Emitter for StandardEmitter {
    fn emit(
        &self,
        ir: &ProviderIr<'_>,
        intents: &EmitterIr,
        notifications: &mut Notifications,
    ) -> (GatewayResources, ErrorList) {
        let mut errors = ErrorList::new();
        let mut resources = base::emit(ir, intents, &mut errors);

        for (key, idx, rule_intents) in base::rules(intents) {
            let Some(rule) = base::rule_mut(&mut resources, key, idx) else {
                continue;
            };
            if let Some(cors) = &rule_intents.cors {
                rule.filters.push(HttpRouteFilter::Cors {
                    cors: cors_filter(cors),
                });
            }
            if let Some(auth) = &rule_intents.ext_auth {
                rule.filters.push(HttpRouteFilter::ExternalAuth {
                    external_auth: ext_auth_filter(auth),
                });
            }

            if rule_intents.timeouts.is_some_and(|t| t.connect.is_some()) {
                notifications.info(
                    format!("HTTPRoute {key} rule {idx}: the Gateway API has no connect timeout; it is dropped"),
                    base::objects(ir, key, idx),
                );
            }
            if rule_intents.ip_range.is_some() {
                notifications.warn(
                    format!("HTTPRoute {key} rule {idx}: IP allow and deny lists cannot be expressed with the Gateway API; use an implementation-specific emitter"),
                    base::objects(ir, key, idx),
                );
            }
            if rule_intents.body_size.is_some() {
                notifications.warn(
                    format!("HTTPRoute {key} rule {idx}: request body limits cannot be expressed with the Gateway API; use an implementation-specific emitter"),
                    base::objects(ir, key, idx),
                );
            }
        }

        (resources, errors)
    }
}

fn cors_filter(cors: &Cors) -> HttpCorsFilter {
    HttpCorsFilter {
        allow_origins: cors.allow_origins.clone(),
        allow_credentials: cors.allow_credentials.then_some(true),
        allow_methods: cors.allow_methods.clone(),
        allow_headers: cors.allow_headers.clone(),
        expose_headers: cors.expose_headers.clone(),
        max_age: Some(i32::try_from(cors.max_age.as_secs()).unwrap_or(i32::MAX)),
    }
}

fn ext_auth_filter(auth: &ExtAuth) -> HttpExternalAuthFilter {
    HttpExternalAuthFilter {
        protocol: "HTTP".to_string(),
        backend_ref: auth.backend.clone(),
        http: Some(HttpAuthConfig {
            path: auth.path.clone(),
            allowed_headers: vec![],
            allowed_response_headers: auth.response_headers.clone(),
        }),
    }
}
