//! `auth-url`: external authorization on the rules an Ingress governs.

use crate::{canary::get_non_canary_ingress, conversion::Conversion};
use ingress2gateway_core::{emitter_ir::ExtAuth, k8s::ResourceExt, ErrorList};
use std::collections::BTreeSet;

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    for (route, by_ingress) in &cx.policies {
        let Some(ctx) = cx.ir.http_routes.get(route) else {
            continue;
        };
        for (name, policy) in by_ingress {
            let Some(auth) = policy.ext_auth.as_ref() else {
                continue;
            };
            let rules = policy
                .rule_backends
                .iter()
                .map(|idx| idx.rule)
                .collect::<BTreeSet<_>>();
            for rule in rules {
                let governs = ctx
                    .rule_backend_sources
                    .get(rule)
                    .and_then(|sources| get_non_canary_ingress(sources))
                    .is_some_and(|ingress| ingress.name_any() == *name);
                if !governs {
                    continue;
                }
                cx.intents.rule_mut(route, rule).ext_auth = Some(ExtAuth {
                    backend: auth.backend.clone(),
                    path: auth.path.clone(),
                    response_headers: auth.response_headers.clone(),
                });
                tracing::debug!(%route, rule, auth = %auth.backend.name, "Added external authorization");
            }
        }
    }
    ErrorList::new()
}
