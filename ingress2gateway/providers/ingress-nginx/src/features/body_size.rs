//! `proxy-body-size` and `client-body-buffer-size`.

use crate::{
    annotations::*,
    conversion::{parse_each, Conversion},
};
use ingress2gateway_core::{
    emitter_ir::BodySize,
    k8s::{Ingress, Quantity},
    ErrorList, NamespacedName,
};
use regex::Regex;
use std::sync::LazyLock;

static NGINX_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)([bkmgBKMG]?)$").expect("should compile"));

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("expected a number of bytes with an optional k, m or g suffix")]
pub struct InvalidSize(());

/// Converts an nginx size (`8k`, `10m`, `1g`) into a Kubernetes quantity
/// (`8k`, `10M`, `1G`).
pub fn convert_nginx_size_to_k8s_quantity(size: &str) -> Result<Quantity, InvalidSize> {
    let caps = NGINX_SIZE.captures(size.trim()).ok_or(InvalidSize(()))?;
    let suffix = match &caps[2] {
        "" | "b" | "B" => "",
        "k" | "K" => "k",
        "m" | "M" => "M",
        "g" | "G" => "G",
        _ => return Err(InvalidSize(())),
    };
    Ok(Quantity(format!("{}{suffix}", &caps[1])))
}

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let sizes = parse_each(cx.ingresses, &mut errors, parse_body_size);
    if sizes.is_empty() {
        return errors;
    }

    for (route, idx, ingress) in cx.governed_rules() {
        if let Some(size) = sizes.get(&NamespacedName::of(ingress)) {
            cx.intents.rule_mut(&route, idx).body_size = Some(size.clone());
        }
    }
    errors
}

fn parse_body_size(ingress: &Ingress, errors: &mut ErrorList) -> Option<BodySize> {
    let body_size = BodySize {
        // nginx treats a zero body size as unlimited.
        max_size: get_parsed_with(
            ingress,
            PROXY_BODY_SIZE,
            errors,
            convert_nginx_size_to_k8s_quantity,
        )
        .filter(|q| !is_zero(q)),
        buffer_size: get_parsed_with(
            ingress,
            CLIENT_BODY_BUFFER_SIZE,
            errors,
            convert_nginx_size_to_k8s_quantity,
        )
        .filter(|q| !is_zero(q)),
    };
    (body_size != BodySize::default()).then_some(body_size)
}

fn is_zero(q: &Quantity) -> bool {
    q.0.trim_end_matches(char::is_alphabetic)
        .bytes()
        .all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mk_ingress;
    use maplit::btreemap;

    #[test]
    fn converts_nginx_sizes() {
        for (input, expected) in [
            ("1024", "1024"),
            ("512", "512"),
            ("512b", "512"),
            ("100k", "100k"),
            ("10m", "10M"),
            ("5G", "5G"),
        ] {
            assert_eq!(
                convert_nginx_size_to_k8s_quantity(input),
                Ok(Quantity(expected.to_string())),
                "{input}"
            );
        }
        for input in ["", "1.5m", "10mb", "10x", "abc", "-1", "m"] {
            assert!(convert_nginx_size_to_k8s_quantity(input).is_err(), "{input}");
        }
    }

    #[test]
    fn zero_body_size_is_unlimited() {
        let mut errors = ErrorList::new();
        let ingress = mk_ingress("web", btreemap! { PROXY_BODY_SIZE => "0" });
        assert_eq!(parse_body_size(&ingress, &mut errors), None);

        let ingress = mk_ingress(
            "web",
            btreemap! {
                PROXY_BODY_SIZE => "0m",
                CLIENT_BODY_BUFFER_SIZE => "16k",
            },
        );
        assert_eq!(
            parse_body_size(&ingress, &mut errors),
            Some(BodySize {
                max_size: None,
                buffer_size: Some(Quantity("16k".to_string())),
            })
        );
        assert!(errors.is_empty());
    }
}
