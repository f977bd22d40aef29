//! `affinity: cookie`: session persistence on the Services an Ingress routes
//! to.

use crate::conversion::Conversion;
use ingress2gateway_core::{ir::SessionAffinity, ErrorList, NamespacedName, ObjectRef};
use std::collections::BTreeSet;

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut conflicts = BTreeSet::new();
    for (route, by_ingress) in &cx.policies {
        let Some(ctx) = cx.ir.http_routes.get(route) else {
            continue;
        };
        for (name, policy) in by_ingress {
            let Some(affinity) = policy.session_affinity.as_ref() else {
                continue;
            };
            let source = NamespacedName::new(&route.namespace, name);

            for idx in &policy.rule_backends {
                let Some(backend) = ctx
                    .rules()
                    .get(idx.rule)
                    .and_then(|rule| rule.backend_refs.get(idx.backend))
                else {
                    continue;
                };
                if !backend.inner.is_service() {
                    continue;
                }
                let service = NamespacedName::new(
                    backend.inner.namespace.as_deref().unwrap_or(&route.namespace),
                    &backend.inner.name,
                );

                let settings = &mut cx.ir.services.entry(service.clone()).or_default().session_affinity;
                match settings {
                    None => {
                        *settings = Some(SessionAffinity {
                            cookie_name: affinity.cookie_name.clone(),
                            max_age: affinity.max_age,
                            source: source.clone(),
                        });
                    }
                    Some(existing)
                        if existing.source == source
                            || (existing.cookie_name == affinity.cookie_name
                                && existing.max_age == affinity.max_age) => {}
                    Some(existing) => {
                        if conflicts.insert((service.clone(), source.clone())) {
                            let ingress = ctx.rule_backend_sources[idx.rule][idx.backend].ingress;
                            cx.notifications.warn(
                                format!(
                                    "Service {service} already has session affinity from Ingress {}; these settings are ignored",
                                    existing.source
                                ),
                                [ObjectRef::of(ingress)],
                            );
                        }
                    }
                }
            }
        }
    }
    ErrorList::new()
}
