//! Infrastructure provider kinds (`infrastructure.cluster.x-k8s.io`)

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Extra;

// =============================================================================
// Docker (CAPD)
// =============================================================================

/// Docker-backed cluster infrastructure
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "DockerCluster",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase", default)]
pub struct DockerClusterSpec {
    /// Load balancer container settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<serde_json::Value>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Extra,
}

/// Template for docker machines
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "DockerMachineTemplate",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase", default)]
pub struct DockerMachineTemplateSpec {
    /// The template body
    pub template: DockerMachineTemplateResource,
}

/// Template body of a DockerMachineTemplate
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DockerMachineTemplateResource {
    /// Machine spec
    pub spec: DockerMachineSpec,
}

/// Desired state of a docker machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DockerMachineSpec {
    /// Node image the container runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_image: Option<String>,
    /// Host directories mounted into the container
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_mounts: Vec<Mount>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Extra,
}

/// Host mount for a docker machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Mount {
    /// Path inside the container
    pub container_path: String,
    /// Path on the host
    pub host_path: String,
    /// Mount read-only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

// =============================================================================
// Snow (CAPAS)
// =============================================================================

/// Snow device cluster infrastructure
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AWSSnowCluster",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase", default)]
pub struct AWSSnowClusterSpec {
    /// Control plane endpoint host and port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<serde_json::Value>,
    /// Credentials used to reach the devices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_ref: Option<serde_json::Value>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Extra,
}

/// Template for snow machines
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AWSSnowMachineTemplate",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase", default)]
pub struct AWSSnowMachineTemplateSpec {
    /// The template body
    pub template: AWSSnowMachineTemplateResource,
}

/// Template body of an AWSSnowMachineTemplate
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AWSSnowMachineTemplateResource {
    /// Machine spec
    pub spec: AWSSnowMachineSpec,
}

/// Desired state of a snow machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AWSSnowMachineSpec {
    /// Instance type, e.g. `sbe-c.large`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// SSH key pair name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key_name: Option<String>,
    /// AMI to boot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ami: Option<serde_json::Value>,
    /// Device IPs machines may be placed on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<String>>,
    /// Network connector type (SFP_PLUS, QSFP, RJ45)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_network_connector_type: Option<String>,
    /// Remaining fields (containersVolume, network, osFamily, ...)
    #[serde(flatten)]
    pub extra: Extra,
}
