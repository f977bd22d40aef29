//! Emits Gateway API resources plus Envoy Gateway policies.
//!
//! Policies attach to a single rule through its `sectionName`, so every rule
//! that needs one is named `rule-<index>` unless it already has a name.

use crate::{base, Emitter, GatewayResources};
use ingress2gateway_core::{
    emitter_ir::{BodySize, Cors, ExtAuth, IpRangeControl, RuleIntents},
    k8s::{
        envoy::{
            self, Authorization, AuthorizationRule, BackendTrafficPolicy,
            BackendTrafficPolicySpec, HttpExtAuthService, Principal, RequestBuffer,
            SecurityPolicy, SecurityPolicySpec, TcpTimeout, Timeout,
        },
        gateway::{LocalPolicyTargetReference, LocalPolicyTargetReferenceWithSectionName},
        GatewayDuration,
    },
    EmitterIr, ErrorList, NamespacedName, Notifications, ProviderIr,
};

#[derive(Copy, Clone, Debug, Default)]
pub struct EnvoyGatewayEmitter;

impl Emitter for EnvoyGatewayEmitter {
    fn emit(
        &self,
        ir: &ProviderIr<'_>,
        intents: &EmitterIr,
        notifications: &mut Notifications,
    ) -> (GatewayResources, ErrorList) {
        let mut errors = ErrorList::new();
        let mut resources = base::emit(ir, intents, &mut errors);

        for (key, idx, rule_intents) in base::rules(intents) {
            let security = security_policy_spec(rule_intents);
            let traffic = traffic_policy_spec(rule_intents);
            if security.is_none() && traffic.is_none() {
                continue;
            }
            let Some(rule) = base::rule_mut(&mut resources, key, idx) else {
                continue;
            };
            let section = rule
                .name
                .get_or_insert_with(|| format!("rule-{idx}"))
                .clone();
            let name = NamespacedName::new(&key.namespace, format!("{}-{section}", key.name));
            let target_refs = vec![LocalPolicyTargetReferenceWithSectionName {
                target: LocalPolicyTargetReference::http_route(&key.name),
                section_name: Some(section),
            }];

            if let Some(spec) = security {
                let mut policy = SecurityPolicy::new(
                    &name.name,
                    SecurityPolicySpec {
                        target_refs: target_refs.clone(),
                        ..spec
                    },
                );
                policy.metadata.namespace = Some(name.namespace.clone());
                tracing::debug!(policy = %name, "Added SecurityPolicy");
                resources.security_policies.insert(name.clone(), policy);
            }
            if let Some(spec) = traffic {
                let mut policy = BackendTrafficPolicy::new(
                    &name.name,
                    BackendTrafficPolicySpec {
                        target_refs,
                        ..spec
                    },
                );
                policy.metadata.namespace = Some(name.namespace.clone());
                tracing::debug!(policy = %name, "Added BackendTrafficPolicy");
                resources.backend_traffic_policies.insert(name.clone(), policy);
            }

            if let Some(BodySize {
                max_size: None,
                buffer_size: Some(_),
            }) = &rule_intents.body_size
            {
                notifications.info(
                    format!("HTTPRoute {key} rule {idx}: Envoy Gateway buffers whole requests; client-body-buffer-size is dropped"),
                    base::objects(ir, key, idx),
                );
            }
        }

        (resources, errors)
    }
}

/// The SecurityPolicy settings of a rule, without target references.
fn security_policy_spec(intents: &RuleIntents) -> Option<SecurityPolicySpec> {
    let spec = SecurityPolicySpec {
        target_refs: vec![],
        cors: intents.cors.as_ref().map(cors),
        authorization: intents.ip_range.as_ref().and_then(authorization),
        ext_auth: intents.ext_auth.as_ref().map(ext_auth),
    };
    (spec != SecurityPolicySpec::default()).then_some(spec)
}

/// The BackendTrafficPolicy settings of a rule, without target references.
fn traffic_policy_spec(intents: &RuleIntents) -> Option<BackendTrafficPolicySpec> {
    let spec = BackendTrafficPolicySpec {
        target_refs: vec![],
        timeout: intents
            .timeouts
            .and_then(|t| t.connect)
            .map(|connect| Timeout {
                tcp: Some(TcpTimeout {
                    connect_timeout: Some(GatewayDuration::from(connect)),
                }),
            }),
        request_buffer: intents
            .body_size
            .as_ref()
            .and_then(|size| size.max_size.clone())
            .map(|limit| RequestBuffer { limit }),
    };
    (spec != BackendTrafficPolicySpec::default()).then_some(spec)
}

fn cors(cors: &Cors) -> envoy::Cors {
    envoy::Cors {
        allow_origins: cors.allow_origins.clone(),
        allow_methods: cors.allow_methods.clone(),
        allow_headers: cors.allow_headers.clone(),
        expose_headers: cors.expose_headers.clone(),
        max_age: Some(GatewayDuration::from(cors.max_age)),
        allow_credentials: Some(cors.allow_credentials),
    }
}

/// Deny rules are evaluated first. With an allow list, everything else is
/// denied.
fn authorization(control: &IpRangeControl) -> Option<Authorization> {
    let mut rules = Vec::new();
    for (name, action, cidrs) in [
        ("deny-source-ranges", "Deny", &control.deny),
        ("allow-source-ranges", "Allow", &control.allow),
    ] {
        if !cidrs.is_empty() {
            rules.push(AuthorizationRule {
                name: Some(name.to_string()),
                action: action.to_string(),
                principal: Principal {
                    client_cidrs: cidrs.iter().map(ToString::to_string).collect(),
                },
            });
        }
    }
    if rules.is_empty() {
        return None;
    }
    let default_action = if control.allow.is_empty() {
        "Allow"
    } else {
        "Deny"
    };
    Some(Authorization {
        default_action: Some(default_action.to_string()),
        rules,
    })
}

fn ext_auth(auth: &ExtAuth) -> envoy::ExtAuth {
    envoy::ExtAuth {
        http: Some(HttpExtAuthService {
            backend_refs: vec![auth.backend.clone()],
            path: auth.path.clone(),
            headers_to_backend: auth.response_headers.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{mk_ir, web_route};
    use ingress2gateway_core::{emitter_ir::Timeouts, k8s::Quantity};
    use std::time::Duration;

    #[test]
    fn attaches_policies_to_named_rules() {
        let ir = mk_ir();
        let mut intents = EmitterIr::default();
        let rule = intents.rule_mut(&web_route(), 0);
        rule.ip_range = Some(IpRangeControl {
            allow: vec!["10.0.0.0/8".parse().unwrap()],
            deny: vec!["10.1.0.0/16".parse().unwrap()],
        });
        rule.body_size = Some(BodySize {
            max_size: Some(Quantity("8Mi".to_string())),
            buffer_size: None,
        });
        rule.timeouts = Some(Timeouts {
            connect: Some(Duration::from_secs(5)),
            ..Default::default()
        });

        let mut notifications = Notifications::default();
        let (resources, errors) = EnvoyGatewayEmitter.emit(&ir, &intents, &mut notifications);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(notifications.is_empty());

        let route = &resources.http_routes[&web_route()];
        assert_eq!(route.spec.rules[0].name.as_deref(), Some("rule-0"));
        assert_eq!(route.spec.rules[0].timeouts, None);

        let key = NamespacedName::new("default", "web-example-com-rule-0");
        let security = &resources.security_policies[&key];
        assert_eq!(
            security.spec.target_refs[0].section_name.as_deref(),
            Some("rule-0")
        );
        assert_eq!(security.spec.target_refs[0].target.kind, "HTTPRoute");
        let authorization = security.spec.authorization.as_ref().unwrap();
        assert_eq!(authorization.default_action.as_deref(), Some("Deny"));
        assert_eq!(
            authorization
                .rules
                .iter()
                .map(|r| (r.action.as_str(), r.principal.client_cidrs.clone()))
                .collect::<Vec<_>>(),
            vec![
                ("Deny", vec!["10.1.0.0/16".to_string()]),
                ("Allow", vec!["10.0.0.0/8".to_string()]),
            ]
        );

        let traffic = &resources.backend_traffic_policies[&key];
        assert_eq!(
            traffic.spec.request_buffer.as_ref().unwrap().limit,
            Quantity("8Mi".to_string())
        );
        assert_eq!(
            traffic
                .spec
                .timeout
                .as_ref()
                .and_then(|t| t.tcp.as_ref())
                .and_then(|t| t.connect_timeout),
            Some(GatewayDuration::from_secs(5))
        );
    }

    #[test]
    fn rules_without_policies_stay_unnamed() {
        let ir = mk_ir();
        let mut intents = EmitterIr::default();
        intents.rule_mut(&web_route(), 0).timeouts = Some(Timeouts {
            read: Some(Duration::from_secs(60)),
            ..Default::default()
        });

        let mut notifications = Notifications::default();
        let (resources, errors) = EnvoyGatewayEmitter.emit(&ir, &intents, &mut notifications);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(resources.security_policies.is_empty());
        assert!(resources.backend_traffic_policies.is_empty());
        assert_eq!(resources.http_routes[&web_route()].spec.rules[0].name, None);
    }

    #[test]
    fn deny_lists_alone_allow_by_default() {
        let control = IpRangeControl {
            allow: vec![],
            deny: vec!["192.168.0.0/16".parse().unwrap()],
        };
        let allow_by_default = authorization(&control).unwrap();
        assert_eq!(allow_by_default.default_action.as_deref(), Some("Allow"));
        assert_eq!(allow_by_default.rules.len(), 1);
        assert_eq!(authorization(&IpRangeControl::default()), None);
    }
}
