use crate::{backend::to_backend_ref, ingress_class, name_from_host, route_name, Options};
use ingress2gateway_core::{
    field::{self, Path},
    ir::HttpRouteContext,
    k8s::{
        gateway::{
            Gateway, GatewaySpec, GatewayTlsConfig, HttpPathMatch, HttpRoute, HttpRouteMatch,
            HttpRouteRule, HttpRouteSpec, Listener, ParentReference, SecretObjectReference,
        },
        HTTPIngressPath, Ingress, IngressBackend, IngressRule, IngressTLS, ResourceExt,
    },
    BackendSource, ErrorList, NamespacedName, ObjectRef, ProviderIr, ServicePorts,
};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub(crate) struct Aggregator<'i> {
    /// Keyed by `<namespace>/<class>/<host>`.
    rule_groups: BTreeMap<String, RuleGroup<'i>>,
    default_backends: Vec<DefaultBackend<'i>>,
}

/// The Ingress rules for a single host.
#[derive(Debug)]
struct RuleGroup<'i> {
    namespace: String,
    /// The first Ingress seen for the host.
    name: String,
    ingress_class: String,
    host: String,
    tls: Vec<&'i IngressTLS>,
    rules: Vec<IngressRuleRef<'i>>,
}

#[derive(Debug)]
struct IngressRuleRef<'i> {
    ingress: &'i Ingress,
    idx: usize,
    rule: &'i IngressRule,
}

#[derive(Debug)]
struct PathRef<'i> {
    ingress: &'i Ingress,
    rule_idx: usize,
    path_idx: usize,
    path: &'i HTTPIngressPath,
}

#[derive(Debug)]
struct DefaultBackend<'i> {
    ingress: &'i Ingress,
    namespace: String,
    ingress_class: String,
    backend: &'i IngressBackend,
}

// === impl Aggregator ===

impl<'i> Aggregator<'i> {
    pub(crate) fn add_ingress(&mut self, ingress: &'i Ingress, default_class: &str) {
        let Some(spec) = ingress.spec.as_ref() else {
            return;
        };
        let namespace = ingress.namespace().unwrap_or_else(|| "default".to_string());
        let class = ingress_class(ingress).unwrap_or(default_class).to_string();

        for (idx, rule) in spec.rules.iter().flatten().enumerate() {
            let host = rule.host.clone().unwrap_or_default();
            let group = self
                .rule_groups
                .entry(format!("{namespace}/{class}/{host}"))
                .or_insert_with(|| RuleGroup {
                    namespace: namespace.clone(),
                    name: ingress.name_any(),
                    ingress_class: class.clone(),
                    host: host.clone(),
                    tls: Vec::new(),
                    rules: Vec::new(),
                });

            for tls in spec.tls.iter().flatten() {
                let covers = match tls.hosts.as_deref() {
                    None | Some([]) => true,
                    Some(hosts) => host.is_empty() || hosts.contains(&host),
                };
                if covers && !group.tls.iter().any(|t| *t == tls) {
                    group.tls.push(tls);
                }
            }
            group.rules.push(IngressRuleRef { ingress, idx, rule });
        }

        if let Some(backend) = spec.default_backend.as_ref() {
            self.default_backends.push(DefaultBackend {
                ingress,
                namespace,
                ingress_class: class,
                backend,
            });
        }
    }

    pub(crate) fn into_ir(
        self,
        service_ports: &ServicePorts,
        options: &Options,
    ) -> (ProviderIr<'i>, ErrorList) {
        let mut ir = ProviderIr::default();
        let mut errors = ErrorList::new();

        for group in self.rule_groups.values() {
            group.add_listeners(&mut ir.gateways);

            let key = NamespacedName::new(&group.namespace, route_name(&group.name, &group.host));
            let ctx = ir
                .http_routes
                .entry(key.clone())
                .or_insert_with(|| HttpRouteContext::new(group.new_route(&key.name)));

            for paths in group.paths_by_match_key() {
                if let Some((rule, sources)) =
                    build_rule(&group.namespace, &paths, service_ports, options, &mut errors)
                {
                    ctx.push_rule(rule, sources);
                }
            }
            tracing::debug!(route = %key, rules = ctx.rules().len(), "Built route");
        }

        for default in &self.default_backends {
            default.add_route(&mut ir, service_ports, &mut errors);
        }

        (ir, errors)
    }
}

// === impl RuleGroup ===

impl<'i> RuleGroup<'i> {
    fn new_route(&self, name: &str) -> HttpRoute {
        let mut route = HttpRoute::new(
            name,
            HttpRouteSpec {
                parent_refs: parent_refs(&self.ingress_class),
                hostnames: if self.host.is_empty() {
                    vec![]
                } else {
                    vec![self.host.clone()]
                },
                rules: vec![],
            },
        );
        route.metadata.namespace = Some(self.namespace.clone());
        route
    }

    /// Groups the paths of every rule by `<pathType>/<path>`, in the order
    /// they were first seen.
    fn paths_by_match_key(&self) -> Vec<Vec<PathRef<'i>>> {
        let mut keys = BTreeMap::<String, usize>::new();
        let mut groups = Vec::<Vec<PathRef<'i>>>::new();
        for rule in &self.rules {
            let Some(http) = rule.rule.http.as_ref() else {
                continue;
            };
            for (path_idx, path) in http.paths.iter().enumerate() {
                let key = format!(
                    "{}/{}",
                    path.path_type,
                    path.path.as_deref().unwrap_or_default()
                );
                let path = PathRef {
                    ingress: rule.ingress,
                    rule_idx: rule.idx,
                    path_idx,
                    path,
                };
                match keys.get(&key) {
                    Some(idx) => groups[*idx].push(path),
                    None => {
                        keys.insert(key, groups.len());
                        groups.push(vec![path]);
                    }
                }
            }
        }
        groups
    }

    /// The listener hostname: the rule host, or the only TLS host of a
    /// host-less rule.
    fn listener_hostname(&self) -> Option<String> {
        if !self.host.is_empty() {
            return Some(self.host.clone());
        }
        let mut tls_hosts = self.tls.iter().flat_map(|tls| tls.hosts.iter().flatten());
        match (tls_hosts.next(), tls_hosts.next()) {
            (Some(host), None) => Some(host.clone()),
            _ => None,
        }
    }

    fn add_listeners(&self, gateways: &mut BTreeMap<NamespacedName, Gateway>) {
        let hostname = self.listener_hostname();
        let prefix = hostname
            .as_deref()
            .map(|h| format!("{}-", name_from_host(h)))
            .unwrap_or_default();

        let gateway = gateway_entry(gateways, &self.namespace, &self.ingress_class);
        merge_listener(
            gateway,
            Listener {
                name: format!("{prefix}http"),
                hostname: hostname.clone(),
                port: 80,
                protocol: "HTTP".to_string(),
                tls: None,
            },
        );

        if !self.tls.is_empty() {
            let certificate_refs = self
                .tls
                .iter()
                .filter_map(|tls| tls.secret_name.clone())
                .map(|name| SecretObjectReference {
                    name,
                    ..Default::default()
                })
                .collect();
            merge_listener(
                gateway,
                Listener {
                    name: format!("{prefix}https"),
                    hostname,
                    port: 443,
                    protocol: "HTTPS".to_string(),
                    tls: Some(GatewayTlsConfig {
                        mode: Some("Terminate".to_string()),
                        certificate_refs,
                    }),
                },
            );
        }
    }
}

// === impl PathRef ===

impl PathRef<'_> {
    fn field(&self) -> Path {
        Path::new("spec")
            .child("rules")
            .index(self.rule_idx)
            .child("http")
            .child("paths")
            .index(self.path_idx)
    }
}

// === impl DefaultBackend ===

impl<'i> DefaultBackend<'i> {
    fn add_route(
        &self,
        ir: &mut ProviderIr<'i>,
        service_ports: &ServicePorts,
        errors: &mut ErrorList,
    ) {
        let field = Path::new("spec").child("defaultBackend");
        let backend_ref =
            match to_backend_ref(self.backend, &self.namespace, service_ports, &field) {
                Ok(backend_ref) => backend_ref,
                Err(error) => {
                    errors.push(error.with_object(ObjectRef::of(self.ingress)));
                    return;
                }
            };

        let gateway = gateway_entry(&mut ir.gateways, &self.namespace, &self.ingress_class);
        merge_listener(
            gateway,
            Listener {
                name: "http".to_string(),
                hostname: None,
                port: 80,
                protocol: "HTTP".to_string(),
                tls: None,
            },
        );

        let name = format!("{}-default-backend", self.ingress.name_any());
        let mut route = HttpRoute::new(
            &name,
            HttpRouteSpec {
                parent_refs: parent_refs(&self.ingress_class),
                ..Default::default()
            },
        );
        route.metadata.namespace = Some(self.namespace.clone());

        let mut ctx = HttpRouteContext::new(route);
        ctx.push_rule(
            HttpRouteRule {
                matches: vec![HttpRouteMatch {
                    path: Some(HttpPathMatch::PathPrefix {
                        value: "/".to_string(),
                    }),
                    ..Default::default()
                }],
                backend_refs: vec![backend_ref],
                ..Default::default()
            },
            vec![BackendSource::default_backend(self.ingress, self.backend)],
        );
        ir.http_routes
            .insert(NamespacedName::new(&self.namespace, name), ctx);
    }
}

fn build_rule<'i>(
    namespace: &str,
    paths: &[PathRef<'i>],
    service_ports: &ServicePorts,
    options: &Options,
    errors: &mut ErrorList,
) -> Option<(HttpRouteRule, Vec<BackendSource<'i>>)> {
    let first = paths.first()?;
    let all_sources = paths
        .iter()
        .map(|p| BackendSource::path(p.ingress, p.path))
        .collect::<Vec<_>>();

    let path_match = match path_match(first, &all_sources, options) {
        Ok(m) => m,
        Err(error) => {
            errors.push(error.with_object(ObjectRef::of(first.ingress)));
            return None;
        }
    };

    let mut backend_refs = Vec::with_capacity(paths.len());
    let mut sources = Vec::with_capacity(paths.len());
    for (path, source) in paths.iter().zip(all_sources) {
        let field = path.field().child("backend");
        match to_backend_ref(&path.path.backend, namespace, service_ports, &field) {
            Ok(backend_ref) => {
                backend_refs.push(backend_ref);
                sources.push(source);
            }
            Err(error) => errors.push(error.with_object(ObjectRef::of(path.ingress))),
        }
    }
    if backend_refs.is_empty() {
        return None;
    }

    let rule = HttpRouteRule {
        matches: vec![HttpRouteMatch {
            path: Some(path_match),
            ..Default::default()
        }],
        backend_refs,
        ..Default::default()
    };
    Some((rule, sources))
}

fn path_match(
    path: &PathRef<'_>,
    sources: &[BackendSource<'_>],
    options: &Options,
) -> Result<HttpPathMatch, field::Error> {
    let value = path
        .path
        .path
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string());
    match path.path.path_type.as_str() {
        "Prefix" => Ok(HttpPathMatch::PathPrefix { value }),
        "Exact" => Ok(HttpPathMatch::Exact { value }),
        "ImplementationSpecific" => match options.implementation_specific_path_match {
            Some(f) => Ok(f(&value, sources)),
            None => Err(field::not_supported(
                path.field().child("pathType"),
                "ImplementationSpecific",
                &["Exact", "Prefix"],
            )),
        },
        other => Err(field::invalid(
            path.field().child("pathType"),
            other,
            "unknown path type",
        )),
    }
}

fn parent_refs(ingress_class: &str) -> Vec<ParentReference> {
    if ingress_class.is_empty() {
        return vec![];
    }
    vec![ParentReference {
        name: ingress_class.to_string(),
        ..Default::default()
    }]
}

fn gateway_entry<'g>(
    gateways: &'g mut BTreeMap<NamespacedName, Gateway>,
    namespace: &str,
    ingress_class: &str,
) -> &'g mut Gateway {
    gateways
        .entry(NamespacedName::new(namespace, ingress_class))
        .or_insert_with(|| {
            let mut gateway = Gateway::new(
                ingress_class,
                GatewaySpec {
                    gateway_class_name: ingress_class.to_string(),
                    listeners: vec![],
                },
            );
            gateway.metadata.namespace = Some(namespace.to_string());
            gateway
        })
}

/// Adds a listener, unioning certificate references with an existing listener
/// of the same name.
fn merge_listener(gateway: &mut Gateway, listener: Listener) {
    let listeners = &mut gateway.spec.listeners;
    let Some(existing) = listeners.iter_mut().find(|l| l.name == listener.name) else {
        listeners.push(listener);
        return;
    };
    if let (Some(existing), Some(new)) = (existing.tls.as_mut(), listener.tls) {
        for cert in new.certificate_refs {
            if !existing.certificate_refs.contains(&cert) {
                existing.certificate_refs.push(cert);
            }
        }
    }
}
