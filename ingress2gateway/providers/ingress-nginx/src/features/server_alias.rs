//! `server-alias`: extra hostnames served like the Ingress host.

use crate::{
    annotations::*,
    conversion::{governing, parse_each, Conversion},
};
use ingress2gateway_common::name_from_host;
use ingress2gateway_core::{
    k8s::{gateway::Listener, Ingress},
    ErrorList, NamespacedName, ObjectRef,
};
use regex::Regex;
use std::sync::LazyLock;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*\.)?[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("should compile")
});

pub(super) fn apply(cx: &mut Conversion<'_>) -> ErrorList {
    let mut errors = ErrorList::new();
    let aliases = parse_each(cx.ingresses, &mut errors, parse_aliases);
    if aliases.is_empty() {
        return errors;
    }

    for (key, ctx) in cx.ir.http_routes.iter_mut() {
        let mut added = Vec::<String>::new();
        let mut sources_of = None;
        for sources in &ctx.rule_backend_sources {
            for alias in governing(&aliases, sources).into_iter().flatten() {
                if !ctx.route.spec.hostnames.contains(alias) && !added.contains(alias) {
                    added.push(alias.clone());
                    sources_of = sources.first().map(|s| s.ingress);
                }
            }
        }
        if added.is_empty() {
            continue;
        }

        let Some(primary) = ctx.route.spec.hostnames.first().cloned() else {
            cx.notifications.warn(
                format!("server-alias is ignored on HTTPRoute {key}, which already matches every host"),
                sources_of.map(ObjectRef::of),
            );
            continue;
        };
        ctx.route.spec.hostnames.extend(added.iter().cloned());

        let primary_prefix = format!("{}-", name_from_host(&primary));
        for parent in &ctx.route.spec.parent_refs {
            let Some(gateway) = cx
                .ir
                .gateways
                .get_mut(&NamespacedName::new(&key.namespace, &parent.name))
            else {
                continue;
            };
            let template = gateway
                .spec
                .listeners
                .iter()
                .filter(|l| l.hostname.as_deref() == Some(primary.as_str()))
                .cloned()
                .collect::<Vec<_>>();

            for alias in &added {
                for listener in &template {
                    let suffix = listener
                        .name
                        .strip_prefix(&primary_prefix)
                        .unwrap_or(&listener.name);
                    let name = format!("{}-{suffix}", name_from_host(alias));
                    if gateway.spec.listeners.iter().any(|l| l.name == name) {
                        continue;
                    }
                    if listener.tls.is_some() {
                        cx.notifications.info(
                            format!("listener {name} reuses the certificates of {primary}; they must also be valid for {alias}"),
                            sources_of.map(ObjectRef::of),
                        );
                    }
                    gateway.spec.listeners.push(Listener {
                        name,
                        hostname: Some(alias.clone()),
                        ..listener.clone()
                    });
                }
            }
        }
        tracing::debug!(route = %key, aliases = ?added, "Added server aliases");
    }
    errors
}

fn parse_aliases(ingress: &Ingress, errors: &mut ErrorList) -> Option<Vec<String>> {
    let value = get(ingress, SERVER_ALIAS)?;
    let aliases = split_list(value);
    if let Some(bad) = aliases.iter().find(|a| !HOSTNAME.is_match(a)) {
        errors.push(invalid(
            ingress,
            SERVER_ALIAS,
            value,
            format!("{bad} is not a valid hostname"),
        ));
        return None;
    }
    (!aliases.is_empty()).then_some(aliases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mk_ingress;
    use maplit::btreemap;

    #[test]
    fn parses_alias_lists() {
        let mut errors = ErrorList::new();
        let ingress = mk_ingress(
            "web",
            btreemap! { SERVER_ALIAS => "www.example.com, *.example.org" },
        );
        assert_eq!(
            parse_aliases(&ingress, &mut errors),
            Some(vec!["www.example.com".to_string(), "*.example.org".to_string()])
        );

        let ingress = mk_ingress("web", btreemap! { SERVER_ALIAS => "ok.example.com,Not_A_Host" });
        assert_eq!(parse_aliases(&ingress, &mut errors), None);
        assert_eq!(errors.len(), 1);
    }
}
