//! `backend-protocol`: moves gRPC rules into GRPCRoutes.

use crate::{
    annotations::*,
    canary::{get_non_canary_ingress, is_canary},
    conversion::{parse_each, Conversion},
};
use ingress2gateway_core::{
    ir::GrpcRouteContext,
    k8s::{
        gateway::{
            GrpcMethodMatch, GrpcRoute, GrpcRouteMatch, GrpcRouteRule, GrpcRouteSpec,
            HttpPathMatch, HttpRouteRule,
        },
        Ingress,
    },
    ErrorList, NamespacedName, Notifications, ObjectRef,
};
use std::{collections::BTreeSet, fmt, str::FromStr};

const PROXY_SSL: &[&str] = &[
    PROXY_SSL_VERIFY,
    PROXY_SSL_SECRET,
    PROXY_SSL_SERVER_NAME,
    PROXY_SSL_NAME,
];

/// Rule-level annotations that are only converted for HTTPRoutes.
const HTTP_ONLY: &[&str] = &[
    X_FORWARDED_PREFIX,
    UPSTREAM_VHOST,
    CONNECTION_PROXY_HEADER,
    SERVER_ALIAS,
    REWRITE_TARGET,
    PROXY_CONNECT_TIMEOUT,
    PROXY_SEND_TIMEOUT,
    PROXY_READ_TIMEOUT,
    PROXY_BODY_SIZE,
    CLIENT_BODY_BUFFER_SIZE,
    ENABLE_CORS,
    WHITELIST_SOURCE_RANGE,
    ALLOWLIST_SOURCE_RANGE,
    DENYLIST_SOURCE_RANGE,
    AUTH_URL,
    AFFINITY,
    APP_ROOT,
    PERMANENT_REDIRECT,
    TEMPORAL_REDIRECT,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Protocol {
    Http,
    Https,
    AutoHttp,
    Grpc,
    Grpcs,
    Fcgi,
    Ajp,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown protocol: expected one of HTTP, HTTPS, AUTO_HTTP, GRPC, GRPCS, FCGI or AJP")]
struct UnknownProtocol(());

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let notifications = &mut cx.notifications;
    let protocols = parse_each(cx.ingresses, &mut errors, |ingress, errors| {
        let protocol = get_parsed::<Protocol>(ingress, BACKEND_PROTOCOL, errors)?;
        match protocol {
            Protocol::Https | Protocol::Grpcs if !has_any(ingress, PROXY_SSL) => {
                notifications.info(
                    format!("backend-protocol {protocol} encrypts traffic to the backend; add proxy-ssl annotations to verify it with a BackendTLSPolicy"),
                    [ObjectRef::of(ingress)],
                );
            }
            Protocol::Fcgi | Protocol::Ajp => {
                notifications.warn(
                    format!("backend-protocol {protocol} has no Gateway API equivalent; the backend is routed as HTTP"),
                    [ObjectRef::of(ingress)],
                );
            }
            _ => {}
        }
        Some(protocol)
    });
    if !protocols.values().any(|p| p.is_grpc()) {
        return errors;
    }

    let mut warned = BTreeSet::new();
    let keys = cx.ir.http_routes.keys().cloned().collect::<Vec<_>>();
    for key in keys {
        let Some(ctx) = cx.ir.http_routes.get(&key) else {
            continue;
        };

        let mut moved = Vec::new();
        for (idx, sources) in ctx.rule_backend_sources.iter().enumerate() {
            let Some(governing) = get_non_canary_ingress(sources) else {
                continue;
            };
            let is_grpc = protocols
                .get(&NamespacedName::of(governing))
                .is_some_and(|p| p.is_grpc());
            if !is_grpc {
                continue;
            }
            match grpc_matches(&ctx.rules()[idx]) {
                Ok(_) => {
                    moved.push(idx);
                    for source in sources {
                        let checked: &[&str] = if std::ptr::eq(source.ingress, governing) {
                            HTTP_ONLY
                        } else if is_canary(source.ingress) {
                            &[CANARY_BY_HEADER]
                        } else {
                            continue;
                        };
                        if warned.insert(NamespacedName::of(source.ingress)) {
                            warn_http_only(source.ingress, checked, &mut cx.notifications);
                        }
                    }
                }
                Err(detail) => cx.notifications.warn(
                    format!("{detail}; the rule stays on HTTPRoute {key}"),
                    [ObjectRef::of(governing)],
                ),
            }
        }
        if moved.is_empty() {
            continue;
        }

        let Some(ctx) = cx.ir.http_routes.get_mut(&key) else {
            continue;
        };
        let removed = ctx.remove_rules(&moved);
        let grpc_name = if ctx.rules().is_empty() {
            key.name.clone()
        } else {
            format!("{}-grpc", key.name)
        };

        let mut route = GrpcRoute::new(
            &grpc_name,
            GrpcRouteSpec {
                parent_refs: ctx.route.spec.parent_refs.clone(),
                hostnames: ctx.route.spec.hostnames.clone(),
                rules: vec![],
            },
        );
        route.metadata.namespace = Some(key.namespace.clone());
        if ctx.rules().is_empty() {
            cx.ir.http_routes.remove(&key);
        }

        let mut grpc = GrpcRouteContext::new(route);
        for (rule, sources) in removed {
            let matches = match grpc_matches(&rule) {
                Ok(matches) => matches,
                Err(_) => continue,
            };
            grpc.push_rule(
                GrpcRouteRule {
                    name: rule.name,
                    matches,
                    filters: vec![],
                    backend_refs: rule.backend_refs,
                },
                sources,
            );
        }
        tracing::debug!(route = %key, grpc = %grpc_name, rules = grpc.route.spec.rules.len(), "Moved rules to GRPCRoute");
        cx.ir
            .grpc_routes
            .insert(NamespacedName::new(&key.namespace, grpc_name), grpc);
    }
    errors
}

/// Reports the annotations of an Ingress that are lost when its rules move to
/// a GRPCRoute.
fn warn_http_only(ingress: &Ingress, keys: &[&str], notifications: &mut Notifications) {
    let dropped = keys
        .iter()
        .filter(|key| has(ingress, key))
        .map(|key| key.trim_start_matches(PREFIX))
        .collect::<Vec<_>>();
    if dropped.is_empty() {
        return;
    }
    notifications.warn(
        format!(
            "{} not converted for gRPC rules; the GRPCRoute is emitted without them",
            dropped.join(", ")
        ),
        [ObjectRef::of(ingress)],
    );
}

/// Converts a rule's HTTP matches into gRPC method matches.
fn grpc_matches(rule: &HttpRouteRule) -> Result<Vec<GrpcRouteMatch>, String> {
    let mut matches = Vec::with_capacity(rule.matches.len());
    for m in &rule.matches {
        let method = match &m.path {
            Some(path) => method_match(path)?,
            None => None,
        };
        if method.is_none() && m.headers.is_empty() {
            continue;
        }
        matches.push(GrpcRouteMatch {
            method,
            headers: m.headers.clone(),
        });
    }
    Ok(matches)
}

/// `/` matches every method, `/<service>` a whole service and
/// `/<service>/<method>` a single method.
fn method_match(path: &HttpPathMatch) -> Result<Option<GrpcMethodMatch>, String> {
    if let HttpPathMatch::RegularExpression { value } = path {
        return Err(format!(
            "regular expression path {value} cannot be converted to a gRPC method match"
        ));
    }
    let value = path.value();
    let trimmed = value.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(None);
    }

    let mut parts = trimmed.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(service), None, None) => Ok(Some(GrpcMethodMatch::Exact {
            service: Some(service.to_string()),
            method: None,
        })),
        (Some(service), Some(method), None) => Ok(Some(GrpcMethodMatch::Exact {
            service: Some(service.to_string()),
            method: Some(method.to_string()),
        })),
        _ => Err(format!(
            "path {value} is not of the form /<service>/<method>"
        )),
    }
}

// === impl Protocol ===

impl Protocol {
    fn is_grpc(&self) -> bool {
        matches!(self, Self::Grpc | Self::Grpcs)
    }
}

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HTTP" => Ok(Self::Http),
            "HTTPS" => Ok(Self::Https),
            "AUTO_HTTP" => Ok(Self::AutoHttp),
            "GRPC" => Ok(Self::Grpc),
            "GRPCS" => Ok(Self::Grpcs),
            "FCGI" => Ok(Self::Fcgi),
            "AJP" => Ok(Self::Ajp),
            _ => Err(UnknownProtocol(())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
            Self::AutoHttp => "AUTO_HTTP",
            Self::Grpc => "GRPC",
            Self::Grpcs => "GRPCS",
            Self::Fcgi => "FCGI",
            Self::Ajp => "AJP",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(value: &str) -> HttpPathMatch {
        HttpPathMatch::PathPrefix {
            value: value.to_string(),
        }
    }

    #[test]
    fn converts_paths_to_method_matches() {
        assert_eq!(method_match(&prefix("/")), Ok(None));
        assert_eq!(
            method_match(&prefix("/helloworld.Greeter")),
            Ok(Some(GrpcMethodMatch::Exact {
                service: Some("helloworld.Greeter".to_string()),
                method: None,
            }))
        );
        assert_eq!(
            method_match(&HttpPathMatch::Exact {
                value: "/helloworld.Greeter/SayHello".to_string()
            }),
            Ok(Some(GrpcMethodMatch::Exact {
                service: Some("helloworld.Greeter".to_string()),
                method: Some("SayHello".to_string()),
            }))
        );
        assert!(method_match(&prefix("/a/b/c")).is_err());
        assert!(method_match(&HttpPathMatch::RegularExpression {
            value: "/.*".to_string()
        })
        .is_err());
    }

    #[test]
    fn parses_protocols_case_insensitively() {
        assert_eq!("grpc".parse::<Protocol>().unwrap(), Protocol::Grpc);
        assert_eq!("GRPCS".parse::<Protocol>().unwrap(), Protocol::Grpcs);
        assert!("h2c".parse::<Protocol>().is_err());
    }
}
