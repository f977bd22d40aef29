//! Request headers nginx sets on proxied requests.

use crate::{
    annotations::*,
    conversion::{governing, parse_each, Conversion},
};
use ingress2gateway_core::{
    k8s::{
        gateway::{GrpcRouteFilter, HttpHeader, HttpHeaderFilter, HttpRouteFilter},
        Ingress,
    },
    ErrorList,
};

/// Annotations and the request header each one sets.
const HEADERS: &[(&str, &str)] = &[
    (X_FORWARDED_PREFIX, "X-Forwarded-Prefix"),
    (UPSTREAM_VHOST, "Host"),
    (CONNECTION_PROXY_HEADER, "Connection"),
];

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let headers = parse_each(cx.ingresses, &mut errors, parse_headers);
    if headers.is_empty() {
        return errors;
    }

    for ctx in cx.ir.http_routes.values_mut() {
        for (rule, sources) in ctx.route.spec.rules.iter_mut().zip(&ctx.rule_backend_sources) {
            if let Some(set) = governing(&headers, sources) {
                rule.filters.push(HttpRouteFilter::RequestHeaderModifier {
                    request_header_modifier: HttpHeaderFilter {
                        set: set.clone(),
                        ..Default::default()
                    },
                });
            }
        }
    }
    for ctx in cx.ir.grpc_routes.values_mut() {
        for (rule, sources) in ctx.route.spec.rules.iter_mut().zip(&ctx.rule_backend_sources) {
            if let Some(set) = governing(&headers, sources) {
                rule.filters.push(GrpcRouteFilter::RequestHeaderModifier {
                    request_header_modifier: HttpHeaderFilter {
                        set: set.clone(),
                        ..Default::default()
                    },
                });
            }
        }
    }
    errors
}

fn parse_headers(ingress: &Ingress, errors: &mut ErrorList) -> Option<Vec<HttpHeader>> {
    let mut set = Vec::new();
    for (key, name) in HEADERS {
        let Some(value) = get(ingress, key) else {
            continue;
        };
        if let Err(error) = http::HeaderValue::from_str(value) {
            errors.push(invalid(ingress, key, value, error));
            continue;
        }
        set.push(HttpHeader {
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    (!set.is_empty()).then_some(set)
}
