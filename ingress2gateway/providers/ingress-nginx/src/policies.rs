//! Per-Ingress policies and the route rules they cover.
//!
//! Unlike the rule-level projectors, a policy follows every backend an
//! Ingress contributed, including backends in rules governed by another
//! Ingress.

use crate::{
    annotations::*,
    conversion::{parse_each, Conversion},
};
use ingress2gateway_core::{
    k8s::{gateway::BackendObjectReference, Ingress, ResourceExt},
    ErrorList, NamespacedName, Notifications, ObjectRef,
};
use std::collections::BTreeSet;

const DEFAULT_COOKIE_NAME: &str = "INGRESSCOOKIE";

/// Two weeks, the longest lifetime ingress-nginx accepts.
const MAX_COOKIE_AGE: u32 = 1_209_600;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Policy {
    pub ext_auth: Option<ExtAuthPolicy>,
    pub session_affinity: Option<SessionAffinityPolicy>,
    /// The backends the Ingress contributed to the route.
    pub rule_backends: BTreeSet<PolicyIndex>,
}

/// A backend of a route rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PolicyIndex {
    pub rule: usize,
    pub backend: usize,
}

/// External authorization through an in-cluster service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtAuthPolicy {
    pub backend: BackendObjectReference,
    pub path: Option<String>,
    pub response_headers: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionAffinityPolicy {
    pub cookie_name: String,
    /// Seconds.
    pub max_age: Option<u32>,
}

/// Records the policies of each Ingress on every route it contributed to.
pub(crate) fn collect(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let notifications = &mut cx.notifications;
    let policies = parse_each(cx.ingresses, &mut errors, |ingress, errors| {
        let policy = Policy {
            ext_auth: parse_ext_auth(ingress, errors, notifications),
            session_affinity: parse_session_affinity(ingress, errors),
            rule_backends: BTreeSet::new(),
        };
        (policy != Policy::default()).then_some(policy)
    });
    if policies.is_empty() {
        return errors;
    }

    for (route, ctx) in &cx.ir.http_routes {
        for (rule, sources) in ctx.rule_backend_sources.iter().enumerate() {
            for (backend, source) in sources.iter().enumerate() {
                let Some(policy) = policies.get(&NamespacedName::of(source.ingress)) else {
                    continue;
                };
                cx.policies
                    .entry(route.clone())
                    .or_default()
                    .entry(source.ingress.name_any())
                    .or_insert_with(|| policy.clone())
                    .rule_backends
                    .insert(PolicyIndex { rule, backend });
            }
        }
    }
    errors
}

fn parse_ext_auth(
    ingress: &Ingress,
    errors: &mut ErrorList,
    notifications: &mut Notifications,
) -> Option<ExtAuthPolicy> {
    for (key, what) in [
        (AUTH_TYPE, "basic and digest authentication"),
        (AUTH_SECRET, "basic and digest authentication"),
        (AUTH_SIGNIN, "sign-in redirects"),
    ] {
        if has(ingress, key) {
            notifications.warn(
                format!("{} is ignored: {what} are not supported", key.trim_start_matches(PREFIX)),
                [ObjectRef::of(ingress)],
            );
        }
    }

    let url = get(ingress, AUTH_URL)?;
    let uri = match url.parse::<http::Uri>() {
        Ok(uri)
            if matches!(uri.scheme_str(), Some("http" | "https")) && uri.host().is_some() =>
        {
            uri
        }
        Ok(_) => {
            errors.push(invalid(ingress, AUTH_URL, url, "must be an absolute http(s) URL"));
            return None;
        }
        Err(error) => {
            errors.push(invalid(ingress, AUTH_URL, url, error));
            return None;
        }
    };

    let host = uri.host().unwrap_or_default();
    let Some((service, namespace)) = cluster_service(host) else {
        notifications.warn(
            format!("auth-url {url} is not an in-cluster service; external authorization is not converted"),
            [ObjectRef::of(ingress)],
        );
        return None;
    };
    let port = uri
        .port_u16()
        .unwrap_or(if uri.scheme_str() == Some("https") { 443 } else { 80 });
    let own_namespace = ingress.namespace().unwrap_or_else(|| "default".to_string());

    Some(ExtAuthPolicy {
        backend: BackendObjectReference {
            name: service.to_string(),
            namespace: (namespace != own_namespace).then(|| namespace.to_string()),
            port: Some(i32::from(port)),
            ..Default::default()
        },
        path: Some(uri.path())
            .filter(|p| !p.is_empty() && *p != "/")
            .map(ToString::to_string),
        response_headers: get(ingress, AUTH_RESPONSE_HEADERS)
            .map(split_list)
            .unwrap_or_default(),
    })
}

/// Splits `<service>.<namespace>[.svc[.cluster.local]]`.
fn cluster_service(host: &str) -> Option<(&str, &str)> {
    let labels = host.split('.').collect::<Vec<_>>();
    match labels.as_slice() {
        [service, namespace]
        | [service, namespace, "svc"]
        | [service, namespace, "svc", "cluster", "local"] => Some((*service, *namespace)),
        _ => None,
    }
}

fn parse_session_affinity(
    ingress: &Ingress,
    errors: &mut ErrorList,
) -> Option<SessionAffinityPolicy> {
    let affinity = get(ingress, AFFINITY)?;
    if affinity != "cookie" {
        errors.push(invalid(
            ingress,
            AFFINITY,
            affinity,
            "only cookie affinity is supported",
        ));
        return None;
    }

    let max_age = match get(ingress, SESSION_COOKIE_MAX_AGE) {
        None => None,
        Some(value) => match value.parse::<u32>() {
            Ok(age) if age <= MAX_COOKIE_AGE => Some(age),
            Ok(_) => {
                errors.push(invalid(
                    ingress,
                    SESSION_COOKIE_MAX_AGE,
                    value,
                    format!("must be at most {MAX_COOKIE_AGE} seconds"),
                ));
                return None;
            }
            Err(error) => {
                errors.push(invalid(ingress, SESSION_COOKIE_MAX_AGE, value, error));
                return None;
            }
        },
    };

    Some(SessionAffinityPolicy {
        cookie_name: get(ingress, SESSION_COOKIE_NAME)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_COOKIE_NAME)
            .to_string(),
        max_age,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mk_ingress;
    use maplit::btreemap;

    #[test]
    fn recognizes_cluster_service_hosts() {
        assert_eq!(cluster_service("auth.security"), Some(("auth", "security")));
        assert_eq!(
            cluster_service("auth.security.svc.cluster.local"),
            Some(("auth", "security"))
        );
        assert_eq!(cluster_service("auth.example.com"), None);
        assert_eq!(cluster_service("auth"), None);
    }

    #[test]
    fn parses_in_cluster_auth_urls() {
        let mut errors = ErrorList::new();
        let mut notifications = Notifications::default();
        let ingress = mk_ingress(
            "web",
            btreemap! {
                AUTH_URL => "http://oauth2-proxy.auth.svc.cluster.local:4180/oauth2/auth",
                AUTH_RESPONSE_HEADERS => "X-Auth-Request-User, X-Auth-Request-Email",
            },
        );
        let policy = parse_ext_auth(&ingress, &mut errors, &mut notifications).unwrap();
        assert!(errors.is_empty());
        assert!(notifications.is_empty());
        assert_eq!(
            policy.backend,
            BackendObjectReference {
                name: "oauth2-proxy".to_string(),
                namespace: Some("auth".to_string()),
                port: Some(4180),
                ..Default::default()
            }
        );
        assert_eq!(policy.path.as_deref(), Some("/oauth2/auth"));
        assert_eq!(policy.response_headers.len(), 2);
    }

    #[test]
    fn external_auth_urls_are_reported() {
        let mut errors = ErrorList::new();
        let mut notifications = Notifications::default();
        let ingress = mk_ingress(
            "web",
            btreemap! {
                AUTH_URL => "https://auth.example.com/verify",
                AUTH_SIGNIN => "https://auth.example.com/start",
            },
        );
        assert_eq!(parse_ext_auth(&ingress, &mut errors, &mut notifications), None);
        assert!(errors.is_empty());
        assert_eq!(notifications.len(), 2);
    }

    #[test]
    fn parses_cookie_affinity() {
        let mut errors = ErrorList::new();
        let ingress = mk_ingress("web", btreemap! { AFFINITY => "cookie" });
        assert_eq!(
            parse_session_affinity(&ingress, &mut errors),
            Some(SessionAffinityPolicy {
                cookie_name: DEFAULT_COOKIE_NAME.to_string(),
                max_age: None,
            })
        );

        let ingress = mk_ingress(
            "web",
            btreemap! {
                AFFINITY => "cookie",
                SESSION_COOKIE_NAME => "route",
                SESSION_COOKIE_MAX_AGE => "3600",
            },
        );
        assert_eq!(
            parse_session_affinity(&ingress, &mut errors),
            Some(SessionAffinityPolicy {
                cookie_name: "route".to_string(),
                max_age: Some(3600),
            })
        );
        assert!(errors.is_empty());

        let ingress = mk_ingress("web", btreemap! { AFFINITY => "ip" });
        assert_eq!(parse_session_affinity(&ingress, &mut errors), None);
        assert_eq!(
            errors[0].error_type,
            ingress2gateway_core::field::ErrorType::Invalid
        );
        let ingress = mk_ingress(
            "web",
            btreemap! {
                AFFINITY => "cookie",
                SESSION_COOKIE_MAX_AGE => "2000000",
            },
        );
        assert_eq!(parse_session_affinity(&ingress, &mut errors), None);
        assert_eq!(errors.len(), 2);
    }
}
