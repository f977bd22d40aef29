//! ingress-nginx annotation keys and value parsers.

use ingress2gateway_core::{
    field::{self, Path},
    k8s::Ingress,
    ErrorList, ObjectRef,
};
use std::{fmt, str::FromStr};

pub const PREFIX: &str = "nginx.ingress.kubernetes.io/";

pub const CANARY: &str = "nginx.ingress.kubernetes.io/canary";
pub const CANARY_WEIGHT: &str = "nginx.ingress.kubernetes.io/canary-weight";
pub const CANARY_BY_WEIGHT: &str = "nginx.ingress.kubernetes.io/canary-by-weight";
pub const CANARY_WEIGHT_TOTAL: &str = "nginx.ingress.kubernetes.io/canary-weight-total";
pub const CANARY_BY_HEADER: &str = "nginx.ingress.kubernetes.io/canary-by-header";
pub const CANARY_BY_HEADER_VALUE: &str = "nginx.ingress.kubernetes.io/canary-by-header-value";
pub const CANARY_BY_HEADER_PATTERN: &str = "nginx.ingress.kubernetes.io/canary-by-header-pattern";
pub const CANARY_BY_COOKIE: &str = "nginx.ingress.kubernetes.io/canary-by-cookie";

pub const USE_REGEX: &str = "nginx.ingress.kubernetes.io/use-regex";
pub const BACKEND_PROTOCOL: &str = "nginx.ingress.kubernetes.io/backend-protocol";

pub const X_FORWARDED_PREFIX: &str = "nginx.ingress.kubernetes.io/x-forwarded-prefix";
pub const UPSTREAM_VHOST: &str = "nginx.ingress.kubernetes.io/upstream-vhost";
pub const CONNECTION_PROXY_HEADER: &str = "nginx.ingress.kubernetes.io/connection-proxy-header";

pub const SERVER_ALIAS: &str = "nginx.ingress.kubernetes.io/server-alias";
pub const REWRITE_TARGET: &str = "nginx.ingress.kubernetes.io/rewrite-target";

pub const PROXY_CONNECT_TIMEOUT: &str = "nginx.ingress.kubernetes.io/proxy-connect-timeout";
pub const PROXY_SEND_TIMEOUT: &str = "nginx.ingress.kubernetes.io/proxy-send-timeout";
pub const PROXY_READ_TIMEOUT: &str = "nginx.ingress.kubernetes.io/proxy-read-timeout";

pub const PROXY_BODY_SIZE: &str = "nginx.ingress.kubernetes.io/proxy-body-size";
pub const CLIENT_BODY_BUFFER_SIZE: &str = "nginx.ingress.kubernetes.io/client-body-buffer-size";

pub const ENABLE_CORS: &str = "nginx.ingress.kubernetes.io/enable-cors";
pub const CORS_ALLOW_ORIGIN: &str = "nginx.ingress.kubernetes.io/cors-allow-origin";
pub const CORS_ALLOW_METHODS: &str = "nginx.ingress.kubernetes.io/cors-allow-methods";
pub const CORS_ALLOW_HEADERS: &str = "nginx.ingress.kubernetes.io/cors-allow-headers";
pub const CORS_EXPOSE_HEADERS: &str = "nginx.ingress.kubernetes.io/cors-expose-headers";
pub const CORS_ALLOW_CREDENTIALS: &str = "nginx.ingress.kubernetes.io/cors-allow-credentials";
pub const CORS_MAX_AGE: &str = "nginx.ingress.kubernetes.io/cors-max-age";

pub const WHITELIST_SOURCE_RANGE: &str = "nginx.ingress.kubernetes.io/whitelist-source-range";
pub const ALLOWLIST_SOURCE_RANGE: &str = "nginx.ingress.kubernetes.io/allowlist-source-range";
pub const DENYLIST_SOURCE_RANGE: &str = "nginx.ingress.kubernetes.io/denylist-source-range";

pub const AUTH_URL: &str = "nginx.ingress.kubernetes.io/auth-url";
pub const AUTH_RESPONSE_HEADERS: &str = "nginx.ingress.kubernetes.io/auth-response-headers";
pub const AUTH_TYPE: &str = "nginx.ingress.kubernetes.io/auth-type";
pub const AUTH_SECRET: &str = "nginx.ingress.kubernetes.io/auth-secret";
pub const AUTH_SIGNIN: &str = "nginx.ingress.kubernetes.io/auth-signin";

pub const AFFINITY: &str = "nginx.ingress.kubernetes.io/affinity";
pub const SESSION_COOKIE_NAME: &str = "nginx.ingress.kubernetes.io/session-cookie-name";
pub const SESSION_COOKIE_MAX_AGE: &str = "nginx.ingress.kubernetes.io/session-cookie-max-age";

pub const PROXY_SSL_VERIFY: &str = "nginx.ingress.kubernetes.io/proxy-ssl-verify";
pub const PROXY_SSL_SECRET: &str = "nginx.ingress.kubernetes.io/proxy-ssl-secret";
pub const PROXY_SSL_SERVER_NAME: &str = "nginx.ingress.kubernetes.io/proxy-ssl-server-name";
pub const PROXY_SSL_NAME: &str = "nginx.ingress.kubernetes.io/proxy-ssl-name";
pub const PROXY_SSL_VERIFY_DEPTH: &str = "nginx.ingress.kubernetes.io/proxy-ssl-verify-depth";
pub const PROXY_SSL_PROTOCOLS: &str = "nginx.ingress.kubernetes.io/proxy-ssl-protocols";
pub const PROXY_SSL_CIPHERS: &str = "nginx.ingress.kubernetes.io/proxy-ssl-ciphers";

pub const APP_ROOT: &str = "nginx.ingress.kubernetes.io/app-root";

pub const PERMANENT_REDIRECT: &str = "nginx.ingress.kubernetes.io/permanent-redirect";
pub const PERMANENT_REDIRECT_CODE: &str = "nginx.ingress.kubernetes.io/permanent-redirect-code";
pub const TEMPORAL_REDIRECT: &str = "nginx.ingress.kubernetes.io/temporal-redirect";
pub const TEMPORAL_REDIRECT_CODE: &str = "nginx.ingress.kubernetes.io/temporal-redirect-code";

pub const SSL_REDIRECT: &str = "nginx.ingress.kubernetes.io/ssl-redirect";
pub const FORCE_SSL_REDIRECT: &str = "nginx.ingress.kubernetes.io/force-ssl-redirect";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("expected one of 1, t, T, TRUE, true, True, 0, f, F, FALSE, false or False")]
pub struct ParseBoolError(());

/// Parses a boolean the way Go's `strconv.ParseBool` does.
pub fn parse_bool(s: &str) -> Result<bool, ParseBoolError> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(ParseBoolError(())),
    }
}

/// Returns the trimmed value of an annotation.
pub(crate) fn get<'a>(ingress: &'a Ingress, key: &str) -> Option<&'a str> {
    ingress
        .metadata
        .annotations
        .as_ref()?
        .get(key)
        .map(|v| v.trim())
}

pub(crate) fn has(ingress: &Ingress, key: &str) -> bool {
    get(ingress, key).is_some()
}

pub(crate) fn path(key: &str) -> Path {
    Path::new("metadata").child("annotations").key(key)
}

/// An invalid annotation value on `ingress`.
pub(crate) fn invalid(
    ingress: &Ingress,
    key: &str,
    value: &str,
    detail: impl fmt::Display,
) -> field::Error {
    field::invalid(path(key), value, detail.to_string()).with_object(ObjectRef::of(ingress))
}

pub(crate) fn get_bool(ingress: &Ingress, key: &str, errors: &mut ErrorList) -> Option<bool> {
    get_parsed_with(ingress, key, errors, parse_bool)
}

pub(crate) fn get_parsed<T>(ingress: &Ingress, key: &str, errors: &mut ErrorList) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    get_parsed_with(ingress, key, errors, str::parse::<T>)
}

/// Parses an annotation, recording an invalid-value error on failure.
pub(crate) fn get_parsed_with<T, E: fmt::Display>(
    ingress: &Ingress,
    key: &str,
    errors: &mut ErrorList,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Option<T> {
    let value = get(ingress, key)?;
    match parse(value) {
        Ok(v) => Some(v),
        Err(error) => {
            errors.push(invalid(ingress, key, value, error));
            None
        }
    }
}

/// Splits a comma-separated annotation value, dropping empty entries.
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Returns true if any of `keys` is set.
pub(crate) fn has_any(ingress: &Ingress, keys: &[&str]) -> bool {
    keys.iter().any(|key| has(ingress, key))
}
