use super::*;
use ingress2gateway_core::{
    ir::{HttpRouteContext, ServiceIr, SessionAffinity},
    k8s::{
        gateway::{HttpPathMatch, HttpRouteMatch, HttpRouteRule, HttpRouteSpec, ParentReference},
        GatewayDuration, ResourceExt,
    },
};
use maplit::btreemap;

pub(crate) fn web_route() -> NamespacedName {
    NamespacedName::new("default", "web-example-com")
}

/// A route with a single backend-less rule.
pub(crate) fn mk_ir() -> ProviderIr<'static> {
    let mut route = HttpRoute::new(
        "web-example-com",
        HttpRouteSpec {
            parent_refs: vec![ParentReference {
                name: "nginx".to_string(),
                ..Default::default()
            }],
            hostnames: vec!["example.com".to_string()],
            rules: vec![],
        },
    );
    route.metadata.namespace = Some("default".to_string());

    let mut ctx = HttpRouteContext::new(route);
    ctx.push_rule(
        HttpRouteRule {
            matches: vec![HttpRouteMatch {
                path: Some(HttpPathMatch::PathPrefix {
                    value: "/".to_string(),
                }),
                ..Default::default()
            }],
            ..Default::default()
        },
        vec![],
    );

    let mut ir = ProviderIr::default();
    ir.http_routes.insert(web_route(), ctx);
    ir
}

#[test]
fn parses_targets() {
    assert_eq!("standard".parse(), Ok(Target::Standard));
    assert_eq!("envoy-gateway".parse(), Ok(Target::EnvoyGateway));
    assert_eq!(
        "istio".parse::<Target>(),
        Err(UnknownTarget("istio".to_string()))
    );
    assert_eq!(Target::EnvoyGateway.to_string(), "envoy-gateway");
}

#[test]
fn rewrites_paths_for_every_target() {
    let ir = mk_ir();
    let mut intents = EmitterIr::default();
    intents.rule_mut(&web_route(), 0).path_rewrite = Some(
        ingress2gateway_core::emitter_ir::PathRewrite::ReplacePrefixMatch("/".to_string()),
    );

    for target in [Target::Standard, Target::EnvoyGateway] {
        let mut notifications = Notifications::default();
        let (resources, errors) = target.emit(&ir, &intents, &mut notifications);
        assert!(errors.is_empty(), "{errors:?}");
        let rule = &resources.http_routes[&web_route()].spec.rules[0];
        assert_eq!(rule.filters.len(), 1, "{target}");
    }
}

#[test]
fn session_affinity_becomes_a_backend_lb_policy() {
    let mut ir = mk_ir();
    ir.services = btreemap! {
        NamespacedName::new("default", "web") => ServiceIr {
            session_affinity: Some(SessionAffinity {
                cookie_name: "route".to_string(),
                max_age: Some(3600),
                source: NamespacedName::new("default", "web"),
            }),
        },
        NamespacedName::new("default", "api") => ServiceIr::default(),
    };

    let mut notifications = Notifications::default();
    let (resources, errors) = Target::Standard.emit(&ir, &EmitterIr::default(), &mut notifications);
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(resources.backend_lb_policies.len(), 1);

    let policy = &resources.backend_lb_policies
        [&NamespacedName::new("default", "web-session-persistence")];
    assert_eq!(policy.namespace().as_deref(), Some("default"));
    assert_eq!(policy.spec.target_refs[0].name, "web");
    let persistence = policy.spec.session_persistence.as_ref().unwrap();
    assert_eq!(persistence.session_name.as_deref(), Some("route"));
    assert_eq!(
        persistence.absolute_timeout,
        Some(GatewayDuration::from_secs(3600))
    );
    assert_eq!(
        persistence
            .cookie_config
            .as_ref()
            .and_then(|c| c.lifetime_type.as_deref()),
        Some("Permanent")
    );
}

#[test]
fn intents_for_missing_rules_are_internal_errors() {
    let ir = mk_ir();
    let mut intents = EmitterIr::default();
    intents.rule_mut(&web_route(), 3).path_rewrite = Some(
        ingress2gateway_core::emitter_ir::PathRewrite::ReplaceFullPath("/".to_string()),
    );

    let mut notifications = Notifications::default();
    let (resources, errors) = Target::EnvoyGateway.emit(&ir, &intents, &mut notifications);
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].error_type,
        ingress2gateway_core::field::ErrorType::Internal
    );
    assert_eq!(resources.len(), 1);
}
