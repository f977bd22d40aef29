//! Provider-neutral intents that each emitter translates into filters or
//! implementation-specific policies.

use crate::{
    k8s::{gateway::BackendObjectReference, Quantity},
    NamespacedName,
};
use ipnet::IpNet;
use std::{collections::BTreeMap, time::Duration};

/// Intents keyed by HTTPRoute and rule index.
#[derive(Clone, Debug, Default)]
pub struct EmitterIr {
    pub http_routes: BTreeMap<NamespacedName, BTreeMap<usize, RuleIntents>>,
}

/// Everything a provider asked for on a single route rule.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleIntents {
    pub body_size: Option<BodySize>,
    pub cors: Option<Cors>,
    pub ip_range: Option<IpRangeControl>,
    pub timeouts: Option<Timeouts>,
    pub path_rewrite: Option<PathRewrite>,
    pub ext_auth: Option<ExtAuth>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BodySize {
    pub max_size: Option<Quantity>,
    pub buffer_size: Option<Quantity>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cors {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: Duration,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IpRangeControl {
    pub allow: Vec<IpNet>,
    pub deny: Vec<IpNet>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Option<Duration>,
    pub send: Option<Duration>,
    pub read: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathRewrite {
    ReplaceFullPath(String),
    ReplacePrefixMatch(String),
}

/// Delegates request authorization to an in-cluster HTTP service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtAuth {
    pub backend: BackendObjectReference,
    pub path: Option<String>,
    pub response_headers: Vec<String>,
}

// === impl EmitterIr ===

impl EmitterIr {
    pub fn rule(&self, route: &NamespacedName, idx: usize) -> Option<&RuleIntents> {
        self.http_routes.get(route)?.get(&idx)
    }

    pub fn rule_mut(&mut self, route: &NamespacedName, idx: usize) -> &mut RuleIntents {
        self.http_routes
            .entry(route.clone())
            .or_default()
            .entry(idx)
            .or_default()
    }
}

// === impl RuleIntents ===

impl RuleIntents {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// === impl Timeouts ===

impl Timeouts {
    /// The timeout for a single backend request: the longer of the read and
    /// send timeouts.
    pub fn backend_request(&self) -> Option<Duration> {
        match (self.read, self.send) {
            (Some(read), Some(send)) => Some(read.max(send)),
            (read, send) => read.or(send),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_request_is_longest_of_read_and_send() {
        let t = Timeouts {
            connect: Some(Duration::from_secs(5)),
            send: Some(Duration::from_secs(30)),
            read: Some(Duration::from_secs(120)),
        };
        assert_eq!(t.backend_request(), Some(Duration::from_secs(120)));

        let t = Timeouts {
            send: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        assert_eq!(t.backend_request(), Some(Duration::from_secs(30)));

        let t = Timeouts {
            connect: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        assert_eq!(t.backend_request(), None);
    }

    #[test]
    fn rule_mut_creates_empty_intents() {
        let mut ir = EmitterIr::default();
        let route = NamespacedName::new("default", "web-example-com");
        assert!(ir.rule(&route, 0).is_none());
        assert!(ir.rule_mut(&route, 0).is_empty());
        ir.rule_mut(&route, 0).path_rewrite = Some(PathRewrite::ReplaceFullPath("/".into()));
        assert!(!ir.rule(&route, 0).unwrap().is_empty());
    }
}
