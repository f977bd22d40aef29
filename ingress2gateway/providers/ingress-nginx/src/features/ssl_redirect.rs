//! `ssl-redirect` and `force-ssl-redirect`.
//!
//! ingress-nginx redirects plain HTTP to HTTPS for every host with TLS unless
//! told otherwise. The converted route is attached to the HTTPS listeners
//! only, and a companion route on the HTTP listeners does the redirect.

use crate::{
    annotations::*,
    canary::get_non_canary_ingress,
    conversion::{parse_each, Conversion},
};
use ingress2gateway_common::name_from_host;
use ingress2gateway_core::{
    ir::HttpRouteContext,
    k8s::{
        gateway::{
            Gateway, HttpRequestRedirectFilter, HttpRoute, HttpRouteFilter, HttpRouteRule,
            HttpRouteSpec, ParentReference,
        },
        Ingress,
    },
    ErrorList, NamespacedName, Notifications, ObjectRef,
};
use std::collections::BTreeMap;

const REDIRECT_STATUS: i32 = 308;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct SslRedirect {
    ssl_redirect: Option<bool>,
    force: Option<bool>,
}

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let settings = parse_each(cx.ingresses, &mut errors, parse_ssl_redirect);

    let mut redirects = Vec::new();
    for (key, ctx) in cx.ir.http_routes.iter_mut() {
        let Some(ingress) = ctx
            .rule_backend_sources
            .iter()
            .find_map(|sources| get_non_canary_ingress(sources))
        else {
            continue;
        };
        let route = Route {
            kind: "HTTPRoute",
            key,
            parent_refs: &ctx.route.spec.parent_refs,
            hostnames: &ctx.route.spec.hostnames,
            ingress,
        };
        let split = split_sections(&route, &settings, &cx.ir.gateways, &mut cx.notifications);
        if let Some(split) = split {
            ctx.route.spec.parent_refs = split.route_refs;
            redirects.push(redirect_route(key, split.redirect_hosts, split.redirect_refs));
        }
    }

    // gRPC clients do not follow redirects, but the plain HTTP listener must
    // not serve a TLS host either.
    for (key, ctx) in cx.ir.grpc_routes.iter_mut() {
        let Some(ingress) = ctx
            .rule_backend_sources
            .iter()
            .find_map(|sources| get_non_canary_ingress(sources))
        else {
            continue;
        };
        let route = Route {
            kind: "GRPCRoute",
            key,
            parent_refs: &ctx.route.spec.parent_refs,
            hostnames: &ctx.route.spec.hostnames,
            ingress,
        };
        let split = split_sections(&route, &settings, &cx.ir.gateways, &mut cx.notifications);
        if let Some(split) = split {
            ctx.route.spec.parent_refs = split.route_refs;
            let covered = redirects.iter().any(|(_, redirect)| {
                redirect.route.spec.hostnames == split.redirect_hosts
                    && redirect.route.spec.parent_refs == split.redirect_refs
            });
            if !covered {
                redirects.push(redirect_route(key, split.redirect_hosts, split.redirect_refs));
            }
        }
    }

    for (key, ctx) in redirects {
        tracing::debug!(route = %key, "Added HTTPS redirect");
        cx.ir.http_routes.insert(key, ctx);
    }
    errors
}

/// A route whose parent refs may be split between HTTP and HTTPS listeners.
struct Route<'a> {
    kind: &'static str,
    key: &'a NamespacedName,
    parent_refs: &'a [ParentReference],
    hostnames: &'a [String],
    ingress: &'a Ingress,
}

/// The parent refs of a route served over HTTPS only, and of the route
/// redirecting its plain HTTP traffic.
struct SectionSplit {
    route_refs: Vec<ParentReference>,
    redirect_refs: Vec<ParentReference>,
    redirect_hosts: Vec<String>,
}

/// Attaches TLS hosts to their HTTPS listeners, or returns `None` when the
/// route keeps its parents as they are.
fn split_sections(
    route: &Route<'_>,
    settings: &BTreeMap<NamespacedName, SslRedirect>,
    gateways: &BTreeMap<NamespacedName, Gateway>,
    notifications: &mut Notifications,
) -> Option<SectionSplit> {
    let config = settings
        .get(&NamespacedName::of(route.ingress))
        .copied()
        .unwrap_or_default();

    let mut sections = Vec::new();
    for parent in route.parent_refs {
        let gateway_key = NamespacedName::new(&route.key.namespace, &parent.name);
        if let Some(gateway) = gateways.get(&gateway_key) {
            for host in host_sections(gateway, route.hostnames) {
                sections.push((parent.name.clone(), host));
            }
        }
    }

    if !sections.iter().any(|(_, host)| host.https.is_some()) {
        if config.force == Some(true) {
            notifications.warn(
                format!(
                    "force-ssl-redirect is ignored: {} {} has no HTTPS listener",
                    route.kind, route.key
                ),
                [ObjectRef::of(route.ingress)],
            );
        }
        return None;
    }
    if config.force != Some(true) && config.ssl_redirect == Some(false) {
        return None;
    }

    // Hosts with TLS are only served over HTTPS; the others keep their
    // HTTP listener.
    let mut split = SectionSplit {
        route_refs: Vec::new(),
        redirect_refs: Vec::new(),
        redirect_hosts: Vec::new(),
    };
    for (gateway, host) in sections {
        match host.https {
            Some(https) => {
                split.route_refs.push(section_ref(&gateway, https));
                split.redirect_refs.push(section_ref(&gateway, host.http));
                if let Some(hostname) = host.hostname {
                    if !split.redirect_hosts.contains(&hostname) {
                        split.redirect_hosts.push(hostname);
                    }
                }
            }
            None => split.route_refs.push(section_ref(&gateway, host.http)),
        }
    }
    Some(split)
}

fn parse_ssl_redirect(ingress: &Ingress, errors: &mut ErrorList) -> Option<SslRedirect> {
    let config = SslRedirect {
        ssl_redirect: get_bool(ingress, SSL_REDIRECT, errors),
        force: get_bool(ingress, FORCE_SSL_REDIRECT, errors),
    };
    (config != SslRedirect::default()).then_some(config)
}

/// The listeners of a gateway that serve one of a route's hostnames.
#[derive(Clone, Debug, PartialEq, Eq)]
struct HostSections {
    hostname: Option<String>,
    http: String,
    https: Option<String>,
}

/// Returns the listeners serving each of the hostnames. A route without
/// hostnames uses the host-less listeners.
fn host_sections(gateway: &Gateway, hostnames: &[String]) -> Vec<HostSections> {
    let hosts = if hostnames.is_empty() {
        vec![None]
    } else {
        hostnames.iter().cloned().map(Some).collect()
    };
    let has = |name: &str| gateway.spec.listeners.iter().any(|l| l.name == name);
    hosts
        .into_iter()
        .filter_map(|hostname| {
            let prefix = hostname
                .as_deref()
                .map(|h| format!("{}-", name_from_host(h)))
                .unwrap_or_default();
            let http = format!("{prefix}http");
            if !has(&http) {
                return None;
            }
            let https = Some(format!("{prefix}https")).filter(|s| has(s));
            Some(HostSections {
                hostname,
                http,
                https,
            })
        })
        .collect()
}

fn section_ref(gateway: &str, section: String) -> ParentReference {
    ParentReference {
        name: gateway.to_string(),
        section_name: Some(section),
        ..Default::default()
    }
}

fn redirect_route<'i>(
    key: &NamespacedName,
    hostnames: Vec<String>,
    parent_refs: Vec<ParentReference>,
) -> (NamespacedName, HttpRouteContext<'i>) {
    let name = format!("{}-ssl-redirect", key.name);
    let mut route = HttpRoute::new(
        &name,
        HttpRouteSpec {
            parent_refs,
            hostnames,
            rules: vec![],
        },
    );
    route.metadata.namespace = Some(key.namespace.clone());

    let mut ctx = HttpRouteContext::new(route);
    ctx.push_rule(
        HttpRouteRule {
            filters: vec![HttpRouteFilter::RequestRedirect {
                request_redirect: HttpRequestRedirectFilter {
                    scheme: Some("https".to_string()),
                    status_code: Some(REDIRECT_STATUS),
                    ..Default::default()
                },
            }],
            ..Default::default()
        },
        vec![],
    );
    (NamespacedName::new(&key.namespace, name), ctx)
}
