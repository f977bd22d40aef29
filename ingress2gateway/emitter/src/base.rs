//! The part of emission shared by every target.

use crate::GatewayResources;
use ingress2gateway_core::{
    emitter_ir::{PathRewrite, RuleIntents},
    field::{self, Path},
    ir::SessionAffinity,
    k8s::{
        gateway::{
            BackendLbPolicy, BackendLbPolicySpec, CookieConfig, HttpPathModifier, HttpRouteFilter,
            HttpRouteRule, HttpUrlRewriteFilter, LocalPolicyTargetReference, SessionPersistence,
        },
        GatewayDuration, ResourceExt,
    },
    EmitterIr, ErrorList, NamespacedName, ObjectRef, ProviderIr,
};

/// Copies the provider IR into a resource bundle and applies the intents
/// that every target expresses the same way: path rewrites, backend request
/// timeouts and session persistence.
pub(crate) fn emit(
    ir: &ProviderIr<'_>,
    intents: &EmitterIr,
    errors: &mut ErrorList,
) -> GatewayResources {
    let mut resources = GatewayResources {
        gateways: ir.gateways.clone(),
        http_routes: ir
            .http_routes
            .iter()
            .map(|(key, ctx)| (key.clone(), ctx.route.clone()))
            .collect(),
        grpc_routes: ir
            .grpc_routes
            .iter()
            .map(|(key, ctx)| (key.clone(), ctx.route.clone()))
            .collect(),
        backend_tls_policies: ir.backend_tls_policies.clone(),
        ..Default::default()
    };

    for (key, idx, rule_intents) in rules(intents) {
        let Some(rule) = rule_mut(&mut resources, key, idx) else {
            errors.push(field::internal(
                Path::new("spec").child("rules").index(idx),
                format!("HTTPRoute {key} has no rule {idx}"),
            ));
            continue;
        };
        if let Some(rewrite) = &rule_intents.path_rewrite {
            rule.filters.push(url_rewrite(rewrite));
        }
        if let Some(timeout) = rule_intents.timeouts.and_then(|t| t.backend_request()) {
            rule.timeouts.get_or_insert_with(Default::default).backend_request =
                Some(GatewayDuration::from(timeout));
        }
    }

    for (key, service) in &ir.services {
        if let Some(affinity) = &service.session_affinity {
            let policy = lb_policy(key, affinity);
            resources
                .backend_lb_policies
                .insert(NamespacedName::new(&key.namespace, policy.name_any()), policy);
        }
    }

    resources
}

/// Iterates over the intents of every rule.
pub(crate) fn rules<'a>(
    intents: &'a EmitterIr,
) -> impl Iterator<Item = (&'a NamespacedName, usize, &'a RuleIntents)> + 'a {
    intents
        .http_routes
        .iter()
        .flat_map(|(key, rules)| rules.iter().map(move |(idx, i)| (key, *idx, i)))
        .filter(|(_, _, i)| !i.is_empty())
}

pub(crate) fn rule_mut<'r>(
    resources: &'r mut GatewayResources,
    key: &NamespacedName,
    idx: usize,
) -> Option<&'r mut HttpRouteRule> {
    resources.http_routes.get_mut(key)?.spec.rules.get_mut(idx)
}

/// The Ingresses a rule was built from, or the route itself for rules
/// without sources.
pub(crate) fn objects(ir: &ProviderIr<'_>, key: &NamespacedName, idx: usize) -> Vec<ObjectRef> {
    let Some(ctx) = ir.http_routes.get(key) else {
        return vec![];
    };
    let mut objects = Vec::new();
    for source in ctx.rule_backend_sources.get(idx).into_iter().flatten() {
        let object = ObjectRef::of(source.ingress);
        if !objects.contains(&object) {
            objects.push(object);
        }
    }
    if objects.is_empty() {
        objects.push(ObjectRef::of(&ctx.route));
    }
    objects
}

fn url_rewrite(rewrite: &PathRewrite) -> HttpRouteFilter {
    let path = match rewrite {
        PathRewrite::ReplaceFullPath(path) => HttpPathModifier::ReplaceFullPath {
            replace_full_path: path.clone(),
        },
        PathRewrite::ReplacePrefixMatch(prefix) => HttpPathModifier::ReplacePrefixMatch {
            replace_prefix_match: prefix.clone(),
        },
    };
    HttpRouteFilter::UrlRewrite {
        url_rewrite: HttpUrlRewriteFilter {
            hostname: None,
            path: Some(path),
        },
    }
}

fn lb_policy(service: &NamespacedName, affinity: &SessionAffinity) -> BackendLbPolicy {
    let lifetime = if affinity.max_age.is_some() {
        "Permanent"
    } else {
        "Session"
    };
    let mut policy = BackendLbPolicy::new(
        &format!("{}-session-persistence", service.name),
        BackendLbPolicySpec {
            target_refs: vec![LocalPolicyTargetReference::service(&service.name)],
            session_persistence: Some(SessionPersistence {
                session_name: Some(affinity.cookie_name.clone()),
                absolute_timeout: affinity
                    .max_age
                    .map(|secs| GatewayDuration::from_secs(secs.into())),
                type_: Some("Cookie".to_string()),
                cookie_config: Some(CookieConfig {
                    lifetime_type: Some(lifetime.to_string()),
                }),
            }),
        },
    );
    policy.metadata.namespace = Some(service.namespace.clone());
    policy
}
