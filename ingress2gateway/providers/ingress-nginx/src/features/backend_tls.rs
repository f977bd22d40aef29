//! `proxy-ssl-*`: verified TLS to backends as BackendTLSPolicies.
//!
//! A policy is only emitted when nginx would verify the backend the same way
//! a BackendTLSPolicy does: verification on, SNI on, and a CA secret and
//! server name given.

use crate::{
    annotations::*,
    conversion::{parse_each, Conversion},
};
use ingress2gateway_core::{
    field,
    k8s::{
        gateway::{
            BackendObjectReference, BackendTlsPolicy, BackendTlsPolicySpec,
            BackendTlsPolicyValidation, LocalObjectReference, LocalPolicyTargetReference,
            LocalPolicyTargetReferenceWithSectionName,
        },
        Ingress, ResourceExt,
    },
    ErrorList, NamespacedName, Notifications, ObjectRef,
};

const REQUIRED: &[&str] = &[
    PROXY_SSL_VERIFY,
    PROXY_SSL_SECRET,
    PROXY_SSL_SERVER_NAME,
    PROXY_SSL_NAME,
];
const UNSUPPORTED: &[&str] = &[PROXY_SSL_VERIFY_DEPTH, PROXY_SSL_PROTOCOLS, PROXY_SSL_CIPHERS];

#[derive(Clone, Debug, PartialEq, Eq)]
struct BackendTls {
    secret_name: String,
    hostname: String,
}

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let notifications = &mut cx.notifications;
    let configs = parse_each(cx.ingresses, &mut errors, |ingress, errors| {
        parse_backend_tls(ingress, notifications)
            .map_err(|error| errors.push(error))
            .ok()
            .flatten()
    });
    if configs.is_empty() {
        return errors;
    }

    let mut targets = Vec::<(&str, &BackendObjectReference, &Ingress)>::new();
    for (key, ctx) in &cx.ir.http_routes {
        for (rule, sources) in ctx.rules().iter().zip(&ctx.rule_backend_sources) {
            for (backend, source) in rule.backend_refs.iter().zip(sources) {
                targets.push((key.namespace.as_str(), &backend.inner, source.ingress));
            }
        }
    }
    for (key, ctx) in &cx.ir.grpc_routes {
        for (rule, sources) in ctx.route.spec.rules.iter().zip(&ctx.rule_backend_sources) {
            for (backend, source) in rule.backend_refs.iter().zip(sources) {
                targets.push((key.namespace.as_str(), &backend.inner, source.ingress));
            }
        }
    }

    for (namespace, backend, ingress) in targets {
        let Some(config) = configs.get(&NamespacedName::of(ingress)) else {
            continue;
        };
        if !backend.is_service() || backend.namespace.as_deref().is_some_and(|ns| ns != namespace)
        {
            continue;
        }

        let policy = new_policy(namespace, &backend.name, config);
        let key = NamespacedName::new(namespace, policy.name_any());
        match cx.ir.backend_tls_policies.get(&key) {
            None => {
                tracing::debug!(policy = %key, "Added BackendTLSPolicy");
                cx.ir.backend_tls_policies.insert(key, policy);
            }
            Some(existing) if existing.spec == policy.spec => {}
            Some(_) => cx.notifications.warn(
                format!("BackendTLSPolicy {key} was already configured by another Ingress; these proxy-ssl settings are ignored"),
                [ObjectRef::of(ingress)],
            ),
        }
    }
    errors
}

fn new_policy(namespace: &str, service: &str, config: &BackendTls) -> BackendTlsPolicy {
    let mut policy = BackendTlsPolicy::new(
        &format!("{service}-backend-tls"),
        BackendTlsPolicySpec {
            target_refs: vec![LocalPolicyTargetReferenceWithSectionName {
                target: LocalPolicyTargetReference::service(service),
                section_name: None,
            }],
            validation: BackendTlsPolicyValidation {
                ca_certificate_refs: vec![LocalObjectReference {
                    group: String::new(),
                    kind: "Secret".to_string(),
                    name: config.secret_name.clone(),
                }],
                well_known_ca_certificates: None,
                hostname: config.hostname.clone(),
            },
        },
    );
    policy.metadata.namespace = Some(namespace.to_string());
    policy
}

/// Returns the TLS settings of an Ingress, `None` when it sets no
/// `proxy-ssl-*` annotation, or an error when the settings cannot be
/// expressed as a BackendTLSPolicy.
fn parse_backend_tls(
    ingress: &Ingress,
    notifications: &mut Notifications,
) -> Result<Option<BackendTls>, field::Error> {
    if !has_any(ingress, REQUIRED) {
        return Ok(None);
    }
    for key in UNSUPPORTED {
        if has(ingress, key) {
            notifications.warn(
                format!(
                    "{} is not supported by BackendTLSPolicy and is ignored",
                    key.trim_start_matches(PREFIX)
                ),
                [ObjectRef::of(ingress)],
            );
        }
    }

    let require_on = |key: &str| match get(ingress, key) {
        Some("on") => Ok(()),
        value => Err(invalid(
            ingress,
            key,
            value.unwrap_or_default(),
            "must be \"on\" for the backend to be verified",
        )),
    };
    require_on(PROXY_SSL_VERIFY)?;
    require_on(PROXY_SSL_SERVER_NAME)?;

    let secret = get(ingress, PROXY_SSL_SECRET)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid(ingress, PROXY_SSL_SECRET, "", "a CA secret is required"))?;
    let secret_name = match secret.split_once('/') {
        None => secret,
        Some((ns, name)) => {
            let own = ingress.namespace().unwrap_or_else(|| "default".to_string());
            if ns != own || name.is_empty() {
                return Err(invalid(
                    ingress,
                    PROXY_SSL_SECRET,
                    secret,
                    format!("must name a secret in namespace {own}"),
                ));
            }
            name
        }
    };

    let hostname = get(ingress, PROXY_SSL_NAME)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid(ingress, PROXY_SSL_NAME, "", "a server name is required"))?;

    Ok(Some(BackendTls {
        secret_name: secret_name.to_string(),
        hostname: hostname.to_string(),
    }))
}
