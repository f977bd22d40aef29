use ingress2gateway_common::ingress_class;
use ingress2gateway_core::{
    k8s::{Ingress, ResourceExt, Service},
    NamespacedName, ServicePorts,
};

/// The resources read for a conversion, filtered to a single ingress class.
#[derive(Clone, Debug, Default)]
pub struct Storage {
    pub ingress_class: String,
    pub ingresses: Vec<Ingress>,
    pub service_ports: ServicePorts,
}

// === impl Storage ===

impl Storage {
    /// Indexes Ingresses of `class` (or with no class at all) and the
    /// named ports of every Service.
    pub fn new(
        class: &str,
        namespace: Option<&str>,
        ingresses: impl IntoIterator<Item = Ingress>,
        services: impl IntoIterator<Item = Service>,
    ) -> Self {
        let class_filter = class;
        let in_namespace = |ns: Option<String>| match namespace {
            Some(filter) => ns.as_deref().unwrap_or("default") == filter,
            None => true,
        };

        let mut ingresses = ingresses
            .into_iter()
            .filter(|ingress| {
                let class = ingress_class(ingress);
                let accepted = class.is_none_or(|c| c == class_filter);
                if !accepted {
                    tracing::debug!(
                        ingress = %NamespacedName::of(ingress),
                        class = ?class,
                        "Skipping Ingress of another class",
                    );
                }
                accepted && in_namespace(ingress.namespace())
            })
            .collect::<Vec<_>>();
        ingresses.sort_by_key(NamespacedName::of);

        let mut service_ports = ServicePorts::new();
        for service in services {
            if !in_namespace(service.namespace()) {
                continue;
            }
            let ports = service
                .spec
                .iter()
                .flat_map(|spec| spec.ports.iter().flatten())
                .filter_map(|port| Some((port.name.clone()?, port.port)))
                .collect();
            service_ports.insert(NamespacedName::of(&service), ports);
        }

        Self {
            ingress_class: class.to_string(),
            ingresses,
            service_ports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingress2gateway_core::k8s::{IngressSpec, ObjectMeta, ServicePort, ServiceSpec};
    use maplit::btreemap;

    fn mk_ingress(ns: &str, name: &str, class: Option<&str>) -> Ingress {
        Ingress {
            metadata: ObjectMeta {
                namespace: Some(ns.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: class.map(ToString::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn filters_by_class_and_namespace() {
        let ingresses = vec![
            mk_ingress("default", "b", Some("nginx")),
            mk_ingress("default", "a", None),
            mk_ingress("default", "c", Some("traefik")),
            mk_ingress("other", "d", Some("nginx")),
        ];

        let storage = Storage::new("nginx", None, ingresses.clone(), None);
        let names = storage
            .ingresses
            .iter()
            .map(|i| i.name_any())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b", "d"]);

        let storage = Storage::new("nginx", Some("other"), ingresses, None);
        assert_eq!(storage.ingresses.len(), 1);
    }

    #[test]
    fn indexes_named_service_ports() {
        let service = Service {
            metadata: ObjectMeta {
                namespace: Some("default".to_string()),
                name: Some("web".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                ports: Some(vec![
                    ServicePort {
                        name: Some("http".to_string()),
                        port: 8080,
                        ..Default::default()
                    },
                    ServicePort {
                        port: 9090,
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let storage = Storage::new("nginx", None, None, Some(service));
        assert_eq!(
            storage.service_ports,
            btreemap! {
                NamespacedName::new("default", "web") => btreemap! { "http".to_string() => 8080 },
            }
        );
    }
}
