use super::references::{LocalObjectReference, LocalPolicyTargetReferenceWithSectionName};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// BackendTLSPolicy configures how a Gateway connects to a backend via TLS.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1alpha3",
    kind = "BackendTLSPolicy",
    root = "BackendTlsPolicy",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct BackendTlsPolicySpec {
    pub target_refs: Vec<LocalPolicyTargetReferenceWithSectionName>,

    pub validation: BackendTlsPolicyValidation,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendTlsPolicyValidation {
    /// References to ConfigMaps or Secrets holding the CA bundle.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ca_certificate_refs: Vec<LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub well_known_ca_certificates: Option<String>,

    /// The SNI name and the name the backend certificate must match.
    pub hostname: String,
}
