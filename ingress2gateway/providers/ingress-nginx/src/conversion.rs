use crate::{
    canary::{get_non_canary_ingress, CanaryHeader},
    features,
    policies::Policy,
    storage::Storage,
};
use ingress2gateway_core::{
    k8s::Ingress, BackendSource, EmitterIr, ErrorList, NamespacedName, Notifications, ProviderIr,
    ServicePorts,
};
use std::collections::BTreeMap;

/// The state threaded through the feature projectors.
#[derive(Debug)]
pub struct Conversion<'i> {
    pub ingresses: &'i [Ingress],
    pub service_ports: &'i ServicePorts,
    pub ir: ProviderIr<'i>,
    pub intents: EmitterIr,
    /// Per-route policies, keyed by the name of the Ingress that set them.
    pub policies: BTreeMap<NamespacedName, BTreeMap<String, Policy>>,
    /// The `canary-by-header` settings of each canary Ingress.
    pub(crate) canary_headers: BTreeMap<NamespacedName, CanaryHeader>,
    pub notifications: Notifications,
}

/// A feature projector: reads annotations and mutates the conversion.
pub(crate) type Feature = fn(&mut Conversion<'_>) -> ErrorList;

// === impl Conversion ===

impl<'i> Conversion<'i> {
    pub fn new(storage: &'i Storage, ir: ProviderIr<'i>) -> Self {
        Self {
            ingresses: &storage.ingresses,
            service_ports: &storage.service_ports,
            ir,
            intents: EmitterIr::default(),
            policies: BTreeMap::new(),
            canary_headers: BTreeMap::new(),
            notifications: Notifications::default(),
        }
    }

    /// Runs every feature projector in order, collecting their errors.
    pub(crate) fn apply_features(&mut self) -> ErrorList {
        let mut errors = ErrorList::new();
        for (name, feature) in features::FEATURES {
            let errs = feature(self);
            tracing::debug!(feature = %name, errors = errs.len(), "Applied feature");
            errors.extend(errs);
        }
        debug_assert!(self.ir.http_routes.values().all(|ctx| ctx.is_consistent()));
        debug_assert!(self.ir.grpc_routes.values().all(|ctx| ctx.is_consistent()));
        errors
    }

    /// Lists every HTTPRoute rule with the Ingress governing it.
    pub(crate) fn governed_rules(&self) -> Vec<(NamespacedName, usize, &'i Ingress)> {
        self.ir
            .http_routes
            .iter()
            .flat_map(|(key, ctx)| {
                ctx.rule_backend_sources
                    .iter()
                    .enumerate()
                    .filter_map(move |(idx, sources)| {
                        Some((key.clone(), idx, get_non_canary_ingress(sources)?))
                    })
            })
            .collect()
    }
}

/// Parses a feature's settings once per Ingress, keyed by Ingress.
///
/// Errors are recorded once per Ingress, no matter how many rules it governs.
pub(crate) fn parse_each<T>(
    ingresses: &[Ingress],
    errors: &mut ErrorList,
    mut parse: impl FnMut(&Ingress, &mut ErrorList) -> Option<T>,
) -> BTreeMap<NamespacedName, T> {
    ingresses
        .iter()
        .filter_map(|ingress| Some((NamespacedName::of(ingress), parse(ingress, errors)?)))
        .collect()
}

/// Looks up the settings of the Ingress governing a rule.
pub(crate) fn governing<'s, T>(
    settings: &'s BTreeMap<NamespacedName, T>,
    sources: &[BackendSource<'_>],
) -> Option<&'s T> {
    settings.get(&NamespacedName::of(get_non_canary_ingress(sources)?))
}
