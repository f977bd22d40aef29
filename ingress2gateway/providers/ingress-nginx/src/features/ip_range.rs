//! `allowlist-source-range`, `whitelist-source-range` and
//! `denylist-source-range`.

use crate::{
    annotations::*,
    conversion::{parse_each, Conversion},
};
use ingress2gateway_core::{
    emitter_ir::IpRangeControl, k8s::Ingress, ErrorList, IpNet, NamespacedName, Notifications,
    ObjectRef,
};
use std::{net::IpAddr, str::FromStr};

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let notifications = &mut cx.notifications;
    let ranges = parse_each(cx.ingresses, &mut errors, |ingress, errors| {
        parse_ranges(ingress, errors, notifications)
    });
    if ranges.is_empty() {
        return errors;
    }

    for (route, idx, ingress) in cx.governed_rules() {
        if let Some(control) = ranges.get(&NamespacedName::of(ingress)) {
            cx.intents.rule_mut(&route, idx).ip_range = Some(control.clone());
        }
    }
    errors
}

fn parse_ranges(
    ingress: &Ingress,
    errors: &mut ErrorList,
    notifications: &mut Notifications,
) -> Option<IpRangeControl> {
    let allow_key = if has(ingress, ALLOWLIST_SOURCE_RANGE) {
        if has(ingress, WHITELIST_SOURCE_RANGE) {
            notifications.warn(
                "both allowlist-source-range and whitelist-source-range are set; whitelist-source-range is ignored",
                [ObjectRef::of(ingress)],
            );
        }
        ALLOWLIST_SOURCE_RANGE
    } else {
        WHITELIST_SOURCE_RANGE
    };

    let control = IpRangeControl {
        allow: get_parsed_with(ingress, allow_key, errors, parse_cidrs).unwrap_or_default(),
        deny: get_parsed_with(ingress, DENYLIST_SOURCE_RANGE, errors, parse_cidrs)
            .unwrap_or_default(),
    };
    (control != IpRangeControl::default()).then_some(control)
}

/// Parses a comma-separated list of CIDRs. Bare addresses are treated as
/// single-host ranges.
fn parse_cidrs(value: &str) -> Result<Vec<IpNet>, String> {
    split_list(value)
        .iter()
        .map(|entry| {
            IpNet::from_str(entry)
                .or_else(|_| IpAddr::from_str(entry).map(IpNet::from))
                .map_err(|_| format!("{entry} is not an IP address or CIDR"))
        })
        .collect()
}
