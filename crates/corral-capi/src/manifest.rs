//! Untyped manifests handed to the apply layer

use std::collections::BTreeMap;

use corral_common::{yaml, Error, Result, MANAGED_BY};
use serde::{Deserialize, Serialize};

use crate::constants::{CLUSTER_NAME_LABEL, MANAGED_BY_LABEL};
use crate::object::{kind_of, CapiObject};

/// A Cluster API manifest represented as an untyped Kubernetes resource
///
/// Holds the API version, kind, metadata and spec of an object so it can be
/// serialized for applying to a cluster.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapiManifest {
    /// API version (e.g., "cluster.x-k8s.io/v1beta1")
    pub api_version: String,
    /// Kind of resource (e.g., "Cluster", "MachineDeployment")
    pub kind: String,
    /// Resource metadata
    pub metadata: ManifestMetadata,
    /// Resource spec (untyped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,
}

/// Metadata for a manifest
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ManifestMetadata {
    /// Name of the resource
    pub name: String,
    /// Namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    /// Annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl CapiManifest {
    /// Create a new manifest
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            metadata: ManifestMetadata {
                name: name.into(),
                namespace: Some(namespace.into()),
                labels: None,
                annotations: None,
            },
            spec: None,
        }
    }

    /// Convert a typed object into a manifest
    pub fn from_object<K: CapiObject>(object: &K) -> Result<Self> {
        let value = serde_json::to_value(object)
            .map_err(|e| Error::serialization_for_kind(kind_of::<K>(), e.to_string()))?;
        serde_json::from_value(value)
            .map_err(|e| Error::serialization_for_kind(kind_of::<K>(), e.to_string()))
    }

    /// Set the spec for this manifest
    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = Some(spec);
        self
    }

    /// Add labels to the manifest
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.metadata.labels = Some(labels);
        self
    }

    /// `Kind namespace/name`, for logs
    pub fn display_name(&self) -> String {
        format!(
            "{} {}/{}",
            self.kind,
            self.metadata.namespace.as_deref().unwrap_or_default(),
            self.metadata.name
        )
    }

    /// Serialize the manifest to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::serialization(e.to_string()))
    }
}

/// Standard labels for generated objects
pub fn create_cluster_labels(cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CLUSTER_NAME_LABEL.to_string(), cluster_name.to_string()),
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
    ])
}

/// Render manifests as a `---` separated YAML document stream
pub fn render_documents(manifests: &[CapiManifest]) -> Result<String> {
    let mut out = String::new();
    for manifest in manifests {
        let value = serde_json::to_value(manifest)
            .map_err(|e| Error::serialization_for_kind(&manifest.kind, e.to_string()))?;
        out.push_str(&yaml::to_yaml_document(&value)?);
        out.push('\n');
    }
    Ok(out)
}
