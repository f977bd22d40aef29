//! `app-root`: redirects requests for `/` to the application root.

use crate::{
    annotations::*,
    conversion::{governing, parse_each, Conversion},
};
use ingress2gateway_core::{
    k8s::{
        gateway::{
            HttpPathMatch, HttpPathModifier, HttpRequestRedirectFilter, HttpRouteFilter,
            HttpRouteMatch, HttpRouteRule,
        },
        Ingress,
    },
    ErrorList,
};

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let roots = parse_each(cx.ingresses, &mut errors, parse_app_root);
    if roots.is_empty() {
        return errors;
    }

    for (route, ctx) in cx.ir.http_routes.iter_mut() {
        let Some(root) = ctx
            .rule_backend_sources
            .iter()
            .find_map(|sources| governing(&roots, sources))
        else {
            continue;
        };
        let root_match = HttpRouteMatch {
            path: Some(HttpPathMatch::Exact {
                value: "/".to_string(),
            }),
            ..Default::default()
        };
        if ctx.rules().iter().any(|r| r.matches.contains(&root_match)) {
            tracing::debug!(%route, "Route already matches /; skipping app-root");
            continue;
        }

        ctx.push_rule(
            HttpRouteRule {
                matches: vec![root_match],
                filters: vec![HttpRouteFilter::RequestRedirect {
                    request_redirect: HttpRequestRedirectFilter {
                        path: Some(HttpPathModifier::ReplaceFullPath {
                            replace_full_path: root.clone(),
                        }),
                        status_code: Some(302),
                        ..Default::default()
                    },
                }],
                ..Default::default()
            },
            vec![],
        );
    }
    errors
}

fn parse_app_root(ingress: &Ingress, errors: &mut ErrorList) -> Option<String> {
    let root = get(ingress, APP_ROOT)?;
    if !root.starts_with('/') || root.contains("://") {
        errors.push(invalid(ingress, APP_ROOT, root, "must be an absolute path"));
        return None;
    }
    Some(root.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mk_ingress;
    use maplit::btreemap;

    #[test]
    fn requires_absolute_paths() {
        let mut errors = ErrorList::new();
        let ingress = mk_ingress("web", btreemap! { APP_ROOT => "/app" });
        assert_eq!(parse_app_root(&ingress, &mut errors), Some("/app".to_string()));

        let ingress = mk_ingress("web", btreemap! { APP_ROOT => "app" });
        assert_eq!(parse_app_root(&ingress, &mut errors), None);
        assert_eq!(errors.len(), 1);
    }
}
