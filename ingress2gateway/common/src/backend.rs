use ingress2gateway_core::{
    field::{self, Path},
    k8s::{
        gateway::{BackendObjectReference, BackendRef},
        IngressBackend,
    },
    NamespacedName, ServicePorts,
};

/// Converts an Ingress backend into a Gateway API backend reference.
///
/// Named Service ports are resolved through `service_ports`.
pub fn to_backend_ref(
    backend: &IngressBackend,
    namespace: &str,
    service_ports: &ServicePorts,
    field: &Path,
) -> Result<BackendRef, field::Error> {
    if let Some(service) = backend.service.as_ref() {
        let port_field = field.child("service").child("port");
        let port = match service.port.as_ref() {
            Some(port) => match (port.number, port.name.as_deref()) {
                (Some(number), _) => number,
                (None, Some(name)) => service_ports
                    .get(&NamespacedName::new(namespace, &service.name))
                    .and_then(|ports| ports.get(name))
                    .copied()
                    .ok_or_else(|| {
                        field::invalid(
                            port_field.child("name"),
                            name,
                            format!("could not resolve port name on Service {}", service.name),
                        )
                    })?,
                (None, None) => {
                    return Err(field::required(port_field, "port name or number is required"))
                }
            },
            None => return Err(field::required(port_field, "port is required")),
        };

        return Ok(BackendRef {
            inner: BackendObjectReference {
                name: service.name.clone(),
                port: Some(port),
                ..Default::default()
            },
            weight: None,
        });
    }

    if let Some(resource) = backend.resource.as_ref() {
        return Ok(BackendRef {
            inner: BackendObjectReference {
                group: Some(resource.api_group.clone().unwrap_or_default()),
                kind: Some(resource.kind.clone()),
                name: resource.name.clone(),
                ..Default::default()
            },
            weight: None,
        });
    }

    Err(field::required(
        field.clone(),
        "backend must specify a service or a resource",
    ))
}
