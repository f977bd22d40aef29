//! `proxy-{connect,send,read}-timeout`.

use crate::{
    annotations::*,
    conversion::{parse_each, Conversion},
};
use ingress2gateway_core::{emitter_ir::Timeouts, k8s::Ingress, ErrorList, NamespacedName};
use std::{num::ParseIntError, time::Duration};

/// Gateway API durations allow at most five digits per component.
const MAX_DURATION: Duration = Duration::from_secs(99_999 * 60 * 60);

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidDuration {
    #[error("empty duration")]
    Empty,

    #[error("invalid unit: expected one of ms, s, m, h, d or w")]
    InvalidUnit,

    #[error("invalid number: {0}")]
    NotANumber(#[from] ParseIntError),

    #[error("duration is too large")]
    Overflow,

    #[error("duration must be greater than zero")]
    Zero,
}

/// Parses an nginx time value: a bare number of seconds, or a sequence of
/// numbers with units such as `1m30s`.
pub fn parse_nginx_duration(s: &str) -> Result<Duration, InvalidDuration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(InvalidDuration::Empty);
    }

    let duration = if s.bytes().all(|b| b.is_ascii_digit()) {
        Duration::from_secs(s.parse()?)
    } else {
        let mut millis = 0u64;
        let mut rest = s;
        while !rest.is_empty() {
            let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            let value = rest[..digits].parse::<u64>()?;
            rest = &rest[digits..];
            let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
            let unit = match &rest[..unit_len] {
                "ms" => 1,
                "s" => 1_000,
                "m" => 60 * 1_000,
                "h" => 60 * 60 * 1_000,
                "d" => 24 * 60 * 60 * 1_000,
                "w" => 7 * 24 * 60 * 60 * 1_000,
                _ => return Err(InvalidDuration::InvalidUnit),
            };
            rest = &rest[unit_len..];
            millis = value
                .checked_mul(unit)
                .and_then(|v| millis.checked_add(v))
                .ok_or(InvalidDuration::Overflow)?;
        }
        Duration::from_millis(millis)
    };

    if duration.is_zero() {
        return Err(InvalidDuration::Zero);
    }
    if duration > MAX_DURATION {
        return Err(InvalidDuration::Overflow);
    }
    Ok(duration)
}

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let timeouts = parse_each(cx.ingresses, &mut errors, parse_timeouts);
    if timeouts.is_empty() {
        return errors;
    }

    for (route, idx, ingress) in cx.governed_rules() {
        if let Some(t) = timeouts.get(&NamespacedName::of(ingress)) {
            cx.intents.rule_mut(&route, idx).timeouts = Some(*t);
        }
    }
    errors
}

fn parse_timeouts(ingress: &Ingress, errors: &mut ErrorList) -> Option<Timeouts> {
    let timeouts = Timeouts {
        connect: get_parsed_with(ingress, PROXY_CONNECT_TIMEOUT, errors, parse_nginx_duration),
        send: get_parsed_with(ingress, PROXY_SEND_TIMEOUT, errors, parse_nginx_duration),
        read: get_parsed_with(ingress, PROXY_READ_TIMEOUT, errors, parse_nginx_duration),
    };
    (timeouts != Timeouts::default()).then_some(timeouts)
}
