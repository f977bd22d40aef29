//! `permanent-redirect` and `temporal-redirect`.

use crate::{
    annotations::*,
    conversion::{parse_each, Conversion},
};
use ingress2gateway_core::{
    k8s::{
        gateway::{HttpPathModifier, HttpRequestRedirectFilter, HttpRouteFilter},
        Ingress,
    },
    ErrorList, NamespacedName, Notifications, ObjectRef,
};

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let notifications = &mut cx.notifications;
    let redirects = parse_each(cx.ingresses, &mut errors, |ingress, errors| {
        parse_redirect(ingress, errors, notifications)
    });
    if redirects.is_empty() {
        return errors;
    }

    for (route, idx, ingress) in cx.governed_rules() {
        let Some(redirect) = redirects.get(&NamespacedName::of(ingress)) else {
            continue;
        };
        let Some(ctx) = cx.ir.http_routes.get_mut(&route) else {
            continue;
        };

        // A redirected rule has no backends, and a rewrite cannot be combined
        // with a redirect.
        ctx.clear_backends(idx);
        ctx.route.spec.rules[idx]
            .filters
            .push(HttpRouteFilter::RequestRedirect {
                request_redirect: redirect.clone(),
            });
        if cx
            .intents
            .rule(&route, idx)
            .is_some_and(|i| i.path_rewrite.is_some())
        {
            cx.intents.rule_mut(&route, idx).path_rewrite = None;
        }
        tracing::debug!(%route, rule = idx, "Redirected rule");
    }
    errors
}

fn parse_redirect(
    ingress: &Ingress,
    errors: &mut ErrorList,
    notifications: &mut Notifications,
) -> Option<HttpRequestRedirectFilter> {
    let (key, code_key, status_code, url) =
        match (get(ingress, PERMANENT_REDIRECT), get(ingress, TEMPORAL_REDIRECT)) {
            (None, None) => return None,
            (Some(_), Some(url)) => {
                notifications.warn(
                    "both permanent-redirect and temporal-redirect are set; temporal-redirect is used",
                    [ObjectRef::of(ingress)],
                );
                (TEMPORAL_REDIRECT, TEMPORAL_REDIRECT_CODE, 302, url)
            }
            (None, Some(url)) => (TEMPORAL_REDIRECT, TEMPORAL_REDIRECT_CODE, 302, url),
            (Some(url), None) => (PERMANENT_REDIRECT, PERMANENT_REDIRECT_CODE, 301, url),
        };

    if let Some(code) = get(ingress, code_key) {
        if code.parse::<i32>().ok() != Some(status_code) {
            notifications.warn(
                format!(
                    "{} {code} is not supported; redirects use {status_code}",
                    code_key.trim_start_matches(PREFIX)
                ),
                [ObjectRef::of(ingress)],
            );
        }
    }

    let uri = match url.parse::<http::Uri>() {
        Ok(uri) => uri,
        Err(error) => {
            errors.push(invalid(ingress, key, url, error));
            return None;
        }
    };
    let (Some(scheme), Some(host)) = (uri.scheme_str(), uri.host()) else {
        errors.push(invalid(ingress, key, url, "must be an absolute URL"));
        return None;
    };
    if uri.query().is_some() {
        notifications.warn(
            format!("the query of redirect URL {url} is dropped"),
            [ObjectRef::of(ingress)],
        );
    }

    let path = uri.path();
    Some(HttpRequestRedirectFilter {
        scheme: Some(scheme.to_string()),
        hostname: Some(host.to_string()),
        port: uri.port_u16().map(i32::from),
        path: Some(HttpPathModifier::ReplaceFullPath {
            replace_full_path: if path.is_empty() { "/" } else { path }.to_string(),
        }),
        status_code: Some(status_code),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mk_ingress;
    use maplit::btreemap;

    #[test]
    fn parses_permanent_redirects() {
        let mut errors = ErrorList::new();
        let mut notifications = Notifications::default();
        let ingress = mk_ingress(
            "web",
            btreemap! {
                PERMANENT_REDIRECT => "https://www.example.com:8443/new",
                PERMANENT_REDIRECT_CODE => "308",
            },
        );
        assert_eq!(
            parse_redirect(&ingress, &mut errors, &mut notifications),
            Some(HttpRequestRedirectFilter {
                scheme: Some("https".to_string()),
                hostname: Some("www.example.com".to_string()),
                port: Some(8443),
                path: Some(HttpPathModifier::ReplaceFullPath {
                    replace_full_path: "/new".to_string()
                }),
                status_code: Some(301),
            })
        );
        assert!(errors.is_empty());
        assert_eq!(notifications.len(), 1);
    }

    #[test]
    fn temporal_redirect_wins() {
        let mut errors = ErrorList::new();
        let mut notifications = Notifications::default();
        let ingress = mk_ingress(
            "web",
            btreemap! {
                PERMANENT_REDIRECT => "https://a.example.com",
                TEMPORAL_REDIRECT => "https://b.example.com?x=1",
            },
        );
        let filter = parse_redirect(&ingress, &mut errors, &mut notifications).unwrap();
        assert_eq!(filter.hostname.as_deref(), Some("b.example.com"));
        assert_eq!(filter.status_code, Some(302));
        assert_eq!(notifications.len(), 2);
    }

    #[test]
    fn relative_urls_are_invalid() {
        let mut errors = ErrorList::new();
        let mut notifications = Notifications::default();
        let ingress = mk_ingress("web", btreemap! { PERMANENT_REDIRECT => "/elsewhere" });
        assert_eq!(parse_redirect(&ingress, &mut errors, &mut notifications), None);
        assert_eq!(errors.len(), 1);
    }
}
