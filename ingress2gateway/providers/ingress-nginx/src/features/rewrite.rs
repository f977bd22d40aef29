//! `rewrite-target`.
//!
//! Only two shapes have a Gateway API equivalent: a constant target, which
//! replaces the whole path, and the `<prefix>(/|$)(.*)` path idiom with a
//! `<target>/$2` target, which replaces the matched prefix.

use crate::{
    annotations::*,
    conversion::{parse_each, Conversion},
};
use ingress2gateway_core::{
    emitter_ir::PathRewrite,
    k8s::{gateway::HttpPathMatch, Ingress},
    ErrorList, NamespacedName, ObjectRef,
};
use regex::Regex;
use std::sync::LazyLock;

static PREFIX_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\(/\|\$\)\(\.\*\)$").expect("should compile"));

static PREFIX_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)/\$2$").expect("should compile"));

static CAPTURE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\d").expect("should compile"));

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let targets = parse_each(cx.ingresses, &mut errors, parse_target);
    if targets.is_empty() {
        return errors;
    }

    for (route, idx, ingress) in cx.governed_rules() {
        let Some(target) = targets.get(&NamespacedName::of(ingress)) else {
            continue;
        };
        let Some(ctx) = cx.ir.http_routes.get_mut(&route) else {
            continue;
        };
        let rule = &mut ctx.route.spec.rules[idx];
        let path = rule
            .matches
            .first()
            .and_then(|m| m.path.as_ref())
            .map(|p| p.value().to_string())
            .unwrap_or_else(|| "/".to_string());

        let Some((prefix, rewrite)) = path_rewrite(&path, target) else {
            cx.notifications.warn(
                format!("rewrite-target {target} on path {path} uses capture groups that cannot be expressed as a Gateway API rewrite; the path is not rewritten"),
                [ObjectRef::of(ingress)],
            );
            continue;
        };
        if let Some(prefix) = prefix {
            for m in &mut rule.matches {
                m.path = Some(HttpPathMatch::PathPrefix {
                    value: prefix.clone(),
                });
            }
        }
        tracing::debug!(%route, rule = idx, ?rewrite, "Rewrote path");
        cx.intents.rule_mut(&route, idx).path_rewrite = Some(rewrite);
    }
    errors
}

/// Returns the rewrite of a rule matching `path`, along with the prefix the
/// rule matches instead when `path` is the prefix idiom. Returns `None` when
/// the target cannot be expressed.
fn path_rewrite(path: &str, target: &str) -> Option<(Option<String>, PathRewrite)> {
    if let (Some(path), Some(target)) = (PREFIX_PATH.captures(path), PREFIX_TARGET.captures(target)) {
        // `/$1/$2` still refers to a capture.
        if !CAPTURE_REF.is_match(&target[1]) {
            return Some((
                Some(non_empty_or_root(&path[1])),
                PathRewrite::ReplacePrefixMatch(non_empty_or_root(&target[1])),
            ));
        }
    }
    if CAPTURE_REF.is_match(target) {
        return None;
    }
    Some((None, PathRewrite::ReplaceFullPath(target.to_string())))
}

fn parse_target(ingress: &Ingress, errors: &mut ErrorList) -> Option<String> {
    let target = get(ingress, REWRITE_TARGET)?;
    if !target.starts_with('/') {
        errors.push(invalid(
            ingress,
            REWRITE_TARGET,
            target,
            "must be an absolute path",
        ));
        return None;
    }
    Some(target.to_string())
}

fn non_empty_or_root(s: &str) -> String {
    if s.is_empty() {
        "/".to_string()
    } else {
        s.to_string()
    }
}
