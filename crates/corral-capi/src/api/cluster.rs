//! Core Cluster API kinds (`cluster.x-k8s.io`)

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Extra, ObjectReference};

/// Top-level Cluster API object tying together control plane and infrastructure
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSpec {
    /// Pod and service networks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_network: Option<serde_json::Value>,
    /// Reference to the control plane object (KubeadmControlPlane)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_ref: Option<ObjectReference>,
    /// Reference to the provider cluster object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrastructure_ref: Option<ObjectReference>,
    /// Reference to an externally managed etcd cluster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_external_etcd_ref: Option<ObjectReference>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Extra,
}

/// A scalable group of worker machines
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "MachineDeployment",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineDeploymentSpec {
    /// Owning cluster
    pub cluster_name: String,
    /// Desired number of machines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Template every machine is stamped from
    pub template: MachineTemplateSpec,
    /// Remaining fields (selector, strategy, ...)
    #[serde(flatten)]
    pub extra: Extra,
}

/// Machine template embedded in a MachineDeployment
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineTemplateSpec {
    /// Labels and annotations stamped onto machines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Machine spec
    pub spec: MachineSpec,
}

/// Desired state of a machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineSpec {
    /// Owning cluster
    pub cluster_name: String,
    /// How the machine is bootstrapped
    pub bootstrap: Bootstrap,
    /// Reference to the provider machine template
    pub infrastructure_ref: ObjectReference,
    /// Kubernetes version of the machine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Extra,
}

/// Bootstrap configuration source for a machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Bootstrap {
    /// Reference to the bootstrap config template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<ObjectReference>,
    /// Pre-rendered bootstrap data secret
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_secret_name: Option<String>,
}
