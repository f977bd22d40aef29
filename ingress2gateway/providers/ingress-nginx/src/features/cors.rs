//! `enable-cors` and the `cors-*` settings.

use crate::{
    annotations::*,
    conversion::{parse_each, Conversion},
};
use ingress2gateway_core::{emitter_ir::Cors, k8s::Ingress, ErrorList, NamespacedName};
use regex::Regex;
use std::{sync::LazyLock, time::Duration};

const DEFAULT_METHODS: &[&str] = &["GET", "PUT", "POST", "DELETE", "PATCH", "OPTIONS"];
const DEFAULT_HEADERS: &[&str] = &[
    "DNT",
    "Keep-Alive",
    "User-Agent",
    "X-Requested-With",
    "If-Modified-Since",
    "Cache-Control",
    "Content-Type",
    "Range",
    "Authorization",
];
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(1_728_000);

static ORIGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*|https?://(\*\.)?[A-Za-z0-9]([A-Za-z0-9.-]*[A-Za-z0-9])?(:[0-9]+)?)$")
        .expect("should compile")
});

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let policies = parse_each(cx.ingresses, &mut errors, parse_cors);
    if policies.is_empty() {
        return errors;
    }

    for (route, idx, ingress) in cx.governed_rules() {
        if let Some(cors) = policies.get(&NamespacedName::of(ingress)) {
            cx.intents.rule_mut(&route, idx).cors = Some(cors.clone());
        }
    }
    errors
}

fn parse_cors(ingress: &Ingress, errors: &mut ErrorList) -> Option<Cors> {
    if get_bool(ingress, ENABLE_CORS, errors) != Some(true) {
        return None;
    }

    // A malformed origin list disables CORS rather than allowing every origin.
    let allow_origins = match get(ingress, CORS_ALLOW_ORIGIN) {
        None => vec!["*".to_string()],
        Some(value) => {
            let origins = split_list(value);
            if let Some(bad) = origins.iter().find(|o| !ORIGIN.is_match(o)) {
                errors.push(invalid(
                    ingress,
                    CORS_ALLOW_ORIGIN,
                    value,
                    format!("{bad} is not * or an http(s) origin"),
                ));
                return None;
            }
            origins
        }
    };

    let list_or = |key: &str, default: &[&str]| match get(ingress, key).map(split_list) {
        Some(list) if !list.is_empty() => list,
        _ => default.iter().map(ToString::to_string).collect(),
    };
    let allow_methods = list_or(CORS_ALLOW_METHODS, DEFAULT_METHODS)
        .into_iter()
        .map(|m| m.to_ascii_uppercase())
        .collect();
    let allow_headers = list_or(CORS_ALLOW_HEADERS, DEFAULT_HEADERS);
    let expose_headers = list_or(CORS_EXPOSE_HEADERS, &[]);

    let allow_credentials = get_bool(ingress, CORS_ALLOW_CREDENTIALS, errors).unwrap_or(true);
    let max_age = get_parsed::<u64>(ingress, CORS_MAX_AGE, errors)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_MAX_AGE);

    Some(Cors {
        allow_origins,
        allow_methods,
        allow_headers,
        expose_headers,
        allow_credentials,
        max_age,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mk_ingress;
    use maplit::btreemap;

    #[test]
    fn applies_nginx_defaults() {
        let mut errors = ErrorList::new();
        let ingress = mk_ingress("web", btreemap! { ENABLE_CORS => "true" });
        let cors = parse_cors(&ingress, &mut errors).unwrap();
        assert!(errors.is_empty());
        assert_eq!(cors.allow_origins, vec!["*".to_string()]);
        assert_eq!(cors.allow_methods.len(), DEFAULT_METHODS.len());
        assert_eq!(cors.allow_headers.len(), DEFAULT_HEADERS.len());
        assert!(cors.expose_headers.is_empty());
        assert!(cors.allow_credentials);
        assert_eq!(cors.max_age, Duration::from_secs(1_728_000));
    }

    #[test]
    fn reads_explicit_settings() {
        let mut errors = ErrorList::new();
        let ingress = mk_ingress(
            "web",
            btreemap! {
                ENABLE_CORS => "true",
                CORS_ALLOW_ORIGIN => "https://app.example.com, https://*.example.org:8443",
                CORS_ALLOW_METHODS => "get, post",
                CORS_ALLOW_CREDENTIALS => "false",
                CORS_MAX_AGE => "600",
            },
        );
        let cors = parse_cors(&ingress, &mut errors).unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(
            cors.allow_origins,
            vec![
                "https://app.example.com".to_string(),
                "https://*.example.org:8443".to_string()
            ]
        );
        assert_eq!(cors.allow_methods, vec!["GET".to_string(), "POST".to_string()]);
        assert!(!cors.allow_credentials);
        assert_eq!(cors.max_age, Duration::from_secs(600));
    }

    #[test]
    fn invalid_origins_disable_cors() {
        let mut errors = ErrorList::new();
        let ingress = mk_ingress(
            "web",
            btreemap! {
                ENABLE_CORS => "true",
                CORS_ALLOW_ORIGIN => "ftp://files.example.com",
            },
        );
        assert_eq!(parse_cors(&ingress, &mut errors), None);
        assert_eq!(errors.len(), 1);

        let ingress = mk_ingress("web", btreemap! { CORS_ALLOW_ORIGIN => "*" });
        assert_eq!(parse_cors(&ingress, &mut errors), None);
        assert_eq!(errors.len(), 1);
    }
}
