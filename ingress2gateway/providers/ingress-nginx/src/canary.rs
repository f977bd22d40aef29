//! Canary Ingresses: weighted traffic splitting and header-based routing.

use crate::{
    annotations::{self, *},
    conversion::{parse_each, Conversion},
};
use ingress2gateway_core::{
    field,
    k8s::{
        gateway::{HttpHeaderMatch, HttpRouteMatch},
        Ingress,
    },
    BackendSource, ErrorList, NamespacedName, Notifications, ObjectRef,
};
use std::{collections::BTreeMap, str::FromStr};

const DEFAULT_WEIGHT_TOTAL: i32 = 100;
const HEADER_ALWAYS: &str = "always";

#[derive(Clone, Debug, PartialEq, Eq)]
enum CanarySettings {
    Valid { weight: i32, total: i32 },
    /// The weight annotations are malformed. Rules with this canary get no
    /// weights at all.
    Invalid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CanaryHeader {
    Exact { name: String, value: String },
    Pattern { name: String, pattern: String },
}

/// Returns true if the Ingress is marked as a canary.
pub fn is_canary(ingress: &Ingress) -> bool {
    annotations::get(ingress, CANARY)
        .and_then(|v| parse_bool(v).ok())
        .unwrap_or(false)
}

/// Returns the Ingress whose annotations govern a rule: the first non-canary
/// source, or the first canary when every source is one.
pub fn get_non_canary_ingress<'i>(sources: &[BackendSource<'i>]) -> Option<&'i Ingress> {
    sources
        .iter()
        .find(|s| !is_canary(s.ingress))
        .or_else(|| sources.first())
        .map(|s| s.ingress)
}

/// Assigns backend weights to rules that mix canary and regular backends.
pub(crate) fn weights(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let notifications = &mut cx.notifications;
    let headers = &mut cx.canary_headers;
    let settings = parse_each(cx.ingresses, &mut errors, |ingress, errors| {
        let settings = parse_settings(ingress, errors, notifications)?;
        if let Some(header) = parse_header(ingress, errors) {
            headers.insert(NamespacedName::of(ingress), header);
        }
        Some(settings)
    });
    if settings.is_empty() {
        return errors;
    }

    for (route, ctx) in cx.ir.http_routes.iter_mut() {
        for (idx, sources) in ctx.rule_backend_sources.iter().enumerate() {
            match rule_weights(sources, &settings) {
                Ok(Some(weights)) => {
                    let rule = &mut ctx.route.spec.rules[idx];
                    for (backend, weight) in rule.backend_refs.iter_mut().zip(weights) {
                        backend.weight = Some(weight);
                    }
                    tracing::debug!(%route, rule = idx, "Split traffic to canary");
                }
                Ok(None) => {}
                Err(error) => errors.push(error),
            }
        }
    }
    errors
}

/// Adds a rule per canary routed by request header. The new rule keeps the
/// original's matches, filters and intents and sends everything to the
/// canary.
pub(crate) fn by_header(cx: &mut Conversion<'_>) -> ErrorList {
    // Headers are parsed, and their errors reported, with the weights.
    if cx.canary_headers.is_empty() {
        return ErrorList::new();
    }

    for (route, ctx) in cx.ir.http_routes.iter_mut() {
        for idx in 0..ctx.rules().len() {
            let sources = ctx.rule_backend_sources[idx].clone();
            for (backend_idx, source) in sources.iter().enumerate() {
                let Some(header) = cx.canary_headers.get(&NamespacedName::of(source.ingress)) else {
                    continue;
                };

                let original = &ctx.route.spec.rules[idx];
                let mut backend = original.backend_refs[backend_idx].clone();
                backend.weight = None;
                let mut rule = original.clone();
                rule.name = None;
                rule.backend_refs = vec![backend];
                if rule.matches.is_empty() {
                    rule.matches.push(HttpRouteMatch::default());
                }
                for m in &mut rule.matches {
                    m.headers.push(header.to_match());
                }

                let new_idx = ctx.push_rule(rule, vec![*source]);
                if let Some(intents) = cx.intents.rule(route, idx).cloned() {
                    *cx.intents.rule_mut(route, new_idx) = intents;
                }
                tracing::debug!(%route, rule = new_idx, header = %header.name(), "Added canary header rule");
            }
        }
    }
    ErrorList::new()
}

fn parse_settings(
    ingress: &Ingress,
    errors: &mut ErrorList,
    notifications: &mut Notifications,
) -> Option<CanarySettings> {
    if get_bool(ingress, CANARY, errors) != Some(true) {
        return None;
    }

    if has(ingress, CANARY_BY_COOKIE) {
        notifications.warn(
            "canary-by-cookie is not supported by the Gateway API; the cookie is ignored",
            [ObjectRef::of(ingress)],
        );
    }
    let weight_key = if has(ingress, CANARY_WEIGHT) {
        CANARY_WEIGHT
    } else {
        CANARY_BY_WEIGHT
    };
    let weight = parse_non_negative(ingress, weight_key, 0, errors);
    let total = parse_non_negative(ingress, CANARY_WEIGHT_TOTAL, DEFAULT_WEIGHT_TOTAL, errors);
    let (Some(weight), Some(total)) = (weight, total) else {
        return Some(CanarySettings::Invalid);
    };

    if total == 0 {
        errors.push(invalid(ingress, CANARY_WEIGHT_TOTAL, "0", "must be greater than zero"));
        return Some(CanarySettings::Invalid);
    }
    if weight > total {
        errors.push(invalid(
            ingress,
            weight_key,
            &weight.to_string(),
            format!("exceeds the canary weight total of {total}"),
        ));
        return Some(CanarySettings::Invalid);
    }
    Some(CanarySettings::Valid { weight, total })
}

fn parse_non_negative(
    ingress: &Ingress,
    key: &str,
    default: i32,
    errors: &mut ErrorList,
) -> Option<i32> {
    let Some(value) = annotations::get(ingress, key) else {
        return Some(default);
    };
    match i32::from_str(value) {
        Ok(n) if n >= 0 => Some(n),
        Ok(_) => {
            errors.push(invalid(ingress, key, value, "must not be negative"));
            None
        }
        Err(error) => {
            errors.push(invalid(ingress, key, value, error));
            None
        }
    }
}

fn parse_header(ingress: &Ingress, errors: &mut ErrorList) -> Option<CanaryHeader> {
    let name = annotations::get(ingress, CANARY_BY_HEADER)?;
    if let Err(error) = http::HeaderName::from_str(name) {
        errors.push(invalid(ingress, CANARY_BY_HEADER, name, error));
        return None;
    }
    let name = name.to_string();

    // An explicit value takes precedence over a pattern.
    if let Some(value) = annotations::get(ingress, CANARY_BY_HEADER_VALUE) {
        return Some(CanaryHeader::Exact {
            name,
            value: value.to_string(),
        });
    }
    if let Some(pattern) = annotations::get(ingress, CANARY_BY_HEADER_PATTERN) {
        if let Err(error) = regex::Regex::new(pattern) {
            errors.push(invalid(ingress, CANARY_BY_HEADER_PATTERN, pattern, error));
            return None;
        }
        return Some(CanaryHeader::Pattern {
            name,
            pattern: pattern.to_string(),
        });
    }
    Some(CanaryHeader::Exact {
        name,
        value: HEADER_ALWAYS.to_string(),
    })
}

/// Computes the weights of a rule's backends, or `None` when the rule has no
/// canary to split with.
///
/// Each canary keeps its own weight. Whatever remains of the total is split
/// evenly across the other backends, the first ones absorbing the remainder.
fn rule_weights(
    sources: &[BackendSource<'_>],
    settings: &BTreeMap<NamespacedName, CanarySettings>,
) -> Result<Option<Vec<i32>>, field::Error> {
    let mut total = None::<i32>;
    let mut canary_sum = 0;
    let mut weights = Vec::with_capacity(sources.len());
    for source in sources {
        match settings.get(&NamespacedName::of(source.ingress)) {
            None => weights.push(None),
            Some(CanarySettings::Invalid) => return Ok(None),
            Some(CanarySettings::Valid {
                weight,
                total: canary_total,
            }) => {
                if let Some(total) = total.filter(|t| t != canary_total) {
                    return Err(invalid(
                        source.ingress,
                        CANARY_WEIGHT_TOTAL,
                        &canary_total.to_string(),
                        format!("conflicts with another canary of the same rule using a total of {total}"),
                    ));
                }
                total = Some(*canary_total);
                canary_sum += weight;
                if canary_sum > *canary_total {
                    return Err(invalid(
                        source.ingress,
                        CANARY_WEIGHT,
                        &weight.to_string(),
                        format!(
                            "canary weights of the rule add up to {canary_sum}, more than the total of {canary_total}"
                        ),
                    ));
                }
                weights.push(Some(*weight));
            }
        }
    }

    let Some(total) = total else {
        return Ok(None);
    };
    let regular = weights.iter().filter(|w| w.is_none()).count();
    if regular == 0 {
        return Ok(None);
    }

    let regular = i32::try_from(regular).unwrap_or(i32::MAX);
    let remaining = total - canary_sum;
    let (share, mut extra) = (remaining / regular, remaining % regular);
    Ok(Some(
        weights
            .into_iter()
            .map(|w| {
                w.unwrap_or_else(|| {
                    if extra > 0 {
                        extra -= 1;
                        share + 1
                    } else {
                        share
                    }
                })
            })
            .collect(),
    ))
}

// === impl CanaryHeader ===

impl CanaryHeader {
    fn name(&self) -> &str {
        match self {
            Self::Exact { name, .. } | Self::Pattern { name, .. } => name,
        }
    }

    fn to_match(&self) -> HttpHeaderMatch {
        match self.clone() {
            Self::Exact { name, value } => HttpHeaderMatch::Exact { name, value },
            Self::Pattern { name, pattern } => HttpHeaderMatch::RegularExpression {
                name,
                value: pattern,
            },
        }
    }
}
