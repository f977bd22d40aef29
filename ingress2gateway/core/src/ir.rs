//! The provider intermediate representation: the Gateway API resources being
//! built plus, for every route rule, the Ingress entries each backend came
//! from.

use crate::{
    k8s::{
        gateway::{BackendTlsPolicy, Gateway, GrpcRoute, GrpcRouteRule, HttpRoute, HttpRouteRule},
        HTTPIngressPath, Ingress, IngressBackend,
    },
    NamespacedName,
};
use std::collections::BTreeMap;

/// Service port names by Service.
pub type ServicePorts = BTreeMap<NamespacedName, BTreeMap<String, i32>>;

/// The aggregate mutated by the feature projectors.
///
/// Borrows the Ingress list it was built from for `'i`.
#[derive(Clone, Debug, Default)]
pub struct ProviderIr<'i> {
    pub gateways: BTreeMap<NamespacedName, Gateway>,
    pub http_routes: BTreeMap<NamespacedName, HttpRouteContext<'i>>,
    pub grpc_routes: BTreeMap<NamespacedName, GrpcRouteContext<'i>>,
    pub backend_tls_policies: BTreeMap<NamespacedName, BackendTlsPolicy>,
    pub services: BTreeMap<NamespacedName, ServiceIr>,
}

/// An HTTPRoute plus the sources of each rule's backends.
///
/// `rule_backend_sources[i][j]` is the Ingress entry that contributed
/// `route.spec.rules[i].backend_refs[j]`.
#[derive(Clone, Debug)]
pub struct HttpRouteContext<'i> {
    pub route: HttpRoute,
    pub rule_backend_sources: Vec<Vec<BackendSource<'i>>>,
}

#[derive(Clone, Debug)]
pub struct GrpcRouteContext<'i> {
    pub route: GrpcRoute,
    pub rule_backend_sources: Vec<Vec<BackendSource<'i>>>,
}

/// The Ingress entry a backend reference was derived from.
#[derive(Copy, Clone, Debug)]
pub struct BackendSource<'i> {
    pub ingress: &'i Ingress,
    pub path: Option<&'i HTTPIngressPath>,
    pub default_backend: Option<&'i IngressBackend>,
}

/// Service-level settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceIr {
    pub session_affinity: Option<SessionAffinity>,
}

/// Cookie-based session affinity for a Service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionAffinity {
    pub cookie_name: String,
    /// Cookie lifetime in seconds. Session cookies have no lifetime.
    pub max_age: Option<u32>,
    /// The Ingress that configured the affinity.
    pub source: NamespacedName,
}

// === impl HttpRouteContext ===

impl<'i> HttpRouteContext<'i> {
    pub fn new(route: HttpRoute) -> Self {
        Self {
            route,
            rule_backend_sources: Vec::new(),
        }
    }

    pub fn rules(&self) -> &[HttpRouteRule] {
        &self.route.spec.rules
    }

    /// Appends a rule together with the sources of its backends.
    pub fn push_rule(&mut self, rule: HttpRouteRule, sources: Vec<BackendSource<'i>>) -> usize {
        debug_assert_eq!(rule.backend_refs.len(), sources.len());
        self.route.spec.rules.push(rule);
        self.rule_backend_sources.push(sources);
        self.route.spec.rules.len() - 1
    }

    /// Drops every backend of a rule along with its sources.
    pub fn clear_backends(&mut self, idx: usize) {
        if let Some(rule) = self.route.spec.rules.get_mut(idx) {
            rule.backend_refs.clear();
        }
        if let Some(sources) = self.rule_backend_sources.get_mut(idx) {
            sources.clear();
        }
    }

    /// Removes the rules at `indices`, returning them with their sources.
    pub fn remove_rules(
        &mut self,
        indices: &[usize],
    ) -> Vec<(HttpRouteRule, Vec<BackendSource<'i>>)> {
        let rules = std::mem::take(&mut self.route.spec.rules);
        let sources = std::mem::take(&mut self.rule_backend_sources);
        let mut removed = Vec::new();
        for (idx, (rule, srcs)) in rules.into_iter().zip(sources).enumerate() {
            if indices.contains(&idx) {
                removed.push((rule, srcs));
            } else {
                self.route.spec.rules.push(rule);
                self.rule_backend_sources.push(srcs);
            }
        }
        removed
    }

    /// Checks that every rule has exactly one source per backend.
    pub fn is_consistent(&self) -> bool {
        self.rules().len() == self.rule_backend_sources.len()
            && self
                .rules()
                .iter()
                .zip(&self.rule_backend_sources)
                .all(|(rule, sources)| rule.backend_refs.len() == sources.len())
    }
}

// === impl GrpcRouteContext ===

impl<'i> GrpcRouteContext<'i> {
    pub fn new(route: GrpcRoute) -> Self {
        Self {
            route,
            rule_backend_sources: Vec::new(),
        }
    }

    pub fn push_rule(&mut self, rule: GrpcRouteRule, sources: Vec<BackendSource<'i>>) -> usize {
        debug_assert_eq!(rule.backend_refs.len(), sources.len());
        self.route.spec.rules.push(rule);
        self.rule_backend_sources.push(sources);
        self.route.spec.rules.len() - 1
    }

    pub fn is_consistent(&self) -> bool {
        self.route.spec.rules.len() == self.rule_backend_sources.len()
            && self
                .route
                .spec
                .rules
                .iter()
                .zip(&self.rule_backend_sources)
                .all(|(rule, sources)| rule.backend_refs.len() == sources.len())
    }
}

// === impl BackendSource ===

impl<'i> BackendSource<'i> {
    pub fn path(ingress: &'i Ingress, path: &'i HTTPIngressPath) -> Self {
        Self {
            ingress,
            path: Some(path),
            default_backend: None,
        }
    }

    pub fn default_backend(ingress: &'i Ingress, backend: &'i IngressBackend) -> Self {
        Self {
            ingress,
            path: None,
            default_backend: Some(backend),
        }
    }

    /// The Ingress backend this source contributed.
    pub fn backend(&self) -> Option<&'i IngressBackend> {
        self.path
            .map(|p| &p.backend)
            .or(self.default_backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::{
        gateway::{BackendObjectReference, BackendRef, HttpRouteSpec},
        IngressServiceBackend, ObjectMeta,
    };

    fn mk_backend_ref(name: &str) -> BackendRef {
        BackendRef {
            inner: BackendObjectReference {
                name: name.to_string(),
                port: Some(80),
                ..Default::default()
            },
            weight: None,
        }
    }

    fn mk_path(service: &str) -> HTTPIngressPath {
        HTTPIngressPath {
            path: Some("/".to_string()),
            path_type: "Prefix".to_string(),
            backend: IngressBackend {
                service: Some(IngressServiceBackend {
                    name: service.to_string(),
                    port: None,
                }),
                resource: None,
            },
        }
    }

    #[test]
    fn rule_mutations_keep_sources_aligned() {
        let ingress = Ingress {
            metadata: ObjectMeta {
                namespace: Some("default".to_string()),
                name: Some("web".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let path_a = mk_path("a");
        let path_b = mk_path("b");

        let mut ctx = HttpRouteContext::new(HttpRoute::new("web", HttpRouteSpec::default()));
        ctx.push_rule(
            HttpRouteRule {
                backend_refs: vec![mk_backend_ref("a"), mk_backend_ref("b")],
                ..Default::default()
            },
            vec![
                BackendSource::path(&ingress, &path_a),
                BackendSource::path(&ingress, &path_b),
            ],
        );
        ctx.push_rule(
            HttpRouteRule {
                backend_refs: vec![mk_backend_ref("b")],
                ..Default::default()
            },
            vec![BackendSource::path(&ingress, &path_b)],
        );
        assert!(ctx.is_consistent());

        ctx.clear_backends(0);
        assert!(ctx.is_consistent());
        assert!(ctx.rules()[0].backend_refs.is_empty());

        let removed = ctx.remove_rules(&[1]);
        assert_eq!(removed.len(), 1);
        assert_eq!(ctx.rules().len(), 1);
        assert!(ctx.is_consistent());
    }
}
