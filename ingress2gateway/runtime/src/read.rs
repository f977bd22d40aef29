//! Reads Ingresses and Services from manifest files.

use crate::core::k8s::{Ingress, Service};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const INGRESS_API_VERSION: &str = "networking.k8s.io/v1";

#[derive(Debug, Default)]
pub(crate) struct Resources {
    pub(crate) ingresses: Vec<Ingress>,
    pub(crate) services: Vec<Service>,
}

pub(crate) fn read_file(path: &Path) -> Result<Resources> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let resources =
        parse(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        ingresses = resources.ingresses.len(),
        services = resources.services.len(),
        "Read manifest"
    );
    Ok(resources)
}

/// Parses a stream of YAML documents. JSON documents, being YAML, are
/// accepted too, and so are `List`s of resources.
pub(crate) fn parse(contents: &str) -> Result<Resources> {
    let mut resources = Resources::default();
    for (idx, document) in serde_yaml::Deserializer::from_str(contents).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .with_context(|| format!("invalid YAML in document {idx}"))?;
        if value.is_null() {
            continue;
        }
        let value = serde_json::to_value(value)
            .with_context(|| format!("document {idx} is not a Kubernetes object"))?;
        resources
            .add(value)
            .with_context(|| format!("failed to decode document {idx}"))?;
    }
    Ok(resources)
}

// === impl Resources ===

impl Resources {
    fn add(&mut self, value: Value) -> Result<()> {
        let kind = value.get("kind").and_then(Value::as_str).unwrap_or_default();
        let api_version = value
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match kind {
            "Ingress" if api_version == INGRESS_API_VERSION => {
                self.ingresses.push(serde_json::from_value(value)?);
            }
            "Ingress" => {
                tracing::warn!(%api_version, "Skipping Ingress of an unsupported API version");
            }
            "Service" if api_version == "v1" => {
                self.services.push(serde_json::from_value(value)?);
            }
            kind if kind.ends_with("List") => {
                let items = match value {
                    Value::Object(mut object) => object.remove("items"),
                    _ => None,
                };
                if let Some(Value::Array(items)) = items {
                    for item in items {
                        self.add(item)?;
                    }
                }
            }
            kind => tracing::debug!(%kind, %api_version, "Skipping resource"),
        }
        Ok(())
    }
}
