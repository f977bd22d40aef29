use crate::{core::Notifications, emitter::GatewayResources};
use anyhow::Result;
use serde::Serialize;
use std::{io::Write, str::FromStr};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown output format {0:?}; expected \"yaml\" or \"json\"")]
pub struct UnknownOutputFormat(String);

/// Writes the resources as a multi-document YAML stream or as a JSON `List`.
pub(crate) fn write_resources(
    mut w: impl Write,
    resources: &GatewayResources,
    format: OutputFormat,
) -> Result<()> {
    let objects = to_values(resources)?;
    match format {
        OutputFormat::Yaml => {
            for object in &objects {
                writeln!(w, "---")?;
                serde_yaml::to_writer(&mut w, object)?;
            }
        }
        OutputFormat::Json => {
            let list = serde_json::json!({
                "apiVersion": "v1",
                "kind": "List",
                "items": objects,
            });
            serde_json::to_writer_pretty(&mut w, &list)?;
            writeln!(w)?;
        }
    }
    w.flush()?;
    Ok(())
}

pub(crate) fn write_notifications(mut w: impl Write, notifications: &Notifications) -> Result<()> {
    for notification in notifications.iter() {
        writeln!(w, "{notification}")?;
    }
    Ok(())
}

/// Gateways first, then routes, then the policies attached to them.
fn to_values(resources: &GatewayResources) -> Result<Vec<serde_json::Value>> {
    fn push<T: Serialize>(
        objects: &mut Vec<serde_json::Value>,
        items: impl IntoIterator<Item = T>,
    ) -> Result<()> {
        for item in items {
            objects.push(serde_json::to_value(item)?);
        }
        Ok(())
    }

    let mut objects = Vec::with_capacity(resources.len());
    push(&mut objects, resources.gateways.values())?;
    push(&mut objects, resources.http_routes.values())?;
    push(&mut objects, resources.grpc_routes.values())?;
    push(&mut objects, resources.backend_tls_policies.values())?;
    push(&mut objects, resources.backend_lb_policies.values())?;
    push(&mut objects, resources.security_policies.values())?;
    push(&mut objects, resources.backend_traffic_policies.values())?;
    Ok(objects)
}

// === impl OutputFormat ===

impl FromStr for OutputFormat {
    type Err = UnknownOutputFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yaml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            s => Err(UnknownOutputFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        k8s::gateway::{HttpRoute, HttpRouteSpec},
        NamespacedName, ObjectRef,
    };

    fn resources() -> GatewayResources {
        let mut resources = GatewayResources::default();
        for name in ["api-example-com", "web-example-com"] {
            let mut route = HttpRoute::new(name, HttpRouteSpec::default());
            route.metadata.namespace = Some("default".to_string());
            resources
                .http_routes
                .insert(NamespacedName::new("default", name), route);
        }
        resources
    }

    #[test]
    fn writes_yaml_documents() {
        let mut buf = Vec::new();
        write_resources(&mut buf, &resources(), OutputFormat::Yaml).unwrap();
        let yaml = String::from_utf8(buf).unwrap();
        assert_eq!(yaml.matches("---\n").count(), 2);
        assert!(yaml.contains("kind: HTTPRoute"));
        let first = yaml.find("name: api-example-com").unwrap();
        let second = yaml.find("name: web-example-com").unwrap();
        assert!(first < second);
    }

    #[test]
    fn writes_a_json_list() {
        let mut buf = Vec::new();
        write_resources(&mut buf, &resources(), OutputFormat::Json).unwrap();
        let list: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(list["kind"], "List");
        assert_eq!(list["items"].as_array().unwrap().len(), 2);
        assert_eq!(list["items"][1]["metadata"]["name"], "web-example-com");
    }

    #[test]
    fn writes_notifications_one_per_line() {
        let mut notifications = Notifications::default();
        notifications.warn(
            "canary-by-cookie is not supported",
            Some(ObjectRef {
                kind: "Ingress".to_string(),
                namespace: Some("default".to_string()),
                name: "web".to_string(),
            }),
        );
        let mut buf = Vec::new();
        write_notifications(&mut buf, &notifications).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "[WARNING] canary-by-cookie is not supported (Ingress default/web)\n"
        );
    }

    #[test]
    fn parses_formats() {
        assert_eq!("json".parse(), Ok(OutputFormat::Json));
        assert!("toml".parse::<OutputFormat>().is_err());
    }
}
