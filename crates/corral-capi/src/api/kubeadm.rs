//! Kubeadm control plane and bootstrap kinds

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Extra, ObjectReference};

/// Control plane managed by kubeadm
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "controlplane.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "KubeadmControlPlane",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase", default)]
pub struct KubeadmControlPlaneSpec {
    /// Number of control plane machines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Kubernetes version
    pub version: String,
    /// Infrastructure template for control plane machines
    pub machine_template: KubeadmControlPlaneMachineTemplate,
    /// Kubeadm configuration for control plane nodes
    pub kubeadm_config_spec: KubeadmConfigSpec,
    /// Remaining fields (rolloutStrategy, ...)
    #[serde(flatten)]
    pub extra: Extra,
}

/// Machine template section of a KubeadmControlPlane
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct KubeadmControlPlaneMachineTemplate {
    /// Labels and annotations stamped onto control plane machines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Reference to the provider machine template
    pub infrastructure_ref: ObjectReference,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Extra,
}

/// Bootstrap configuration template for worker machines
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "bootstrap.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "KubeadmConfigTemplate",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase", default)]
pub struct KubeadmConfigTemplateSpec {
    /// The template body
    pub template: KubeadmConfigTemplateResource,
}

/// Template body of a KubeadmConfigTemplate
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct KubeadmConfigTemplateResource {
    /// Kubeadm configuration
    pub spec: KubeadmConfigSpec,
}

/// Kubeadm configuration shared by control plane and bootstrap templates
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct KubeadmConfigSpec {
    /// kubeadm ClusterConfiguration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_configuration: Option<serde_json::Value>,
    /// kubeadm InitConfiguration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_configuration: Option<serde_json::Value>,
    /// kubeadm JoinConfiguration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_configuration: Option<JoinConfiguration>,
    /// Files written to the machine before kubeadm runs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
    /// Commands run before kubeadm
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_kubeadm_commands: Vec<String>,
    /// Commands run after kubeadm
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_kubeadm_commands: Vec<String>,
    /// Remaining fields (users, format, ntp, ...)
    #[serde(flatten)]
    pub extra: Extra,
}

/// kubeadm JoinConfiguration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinConfiguration {
    /// Node registration options
    pub node_registration: NodeRegistrationOptions,
    /// Remaining fields (discovery, controlPlane, ...)
    #[serde(flatten)]
    pub extra: Extra,
}

/// kubeadm node registration options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeRegistrationOptions {
    /// Node name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// CRI socket path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cri_socket: Option<String>,
    /// Extra kubelet flags; node labels travel here as `node-labels`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubelet_extra_args: Option<BTreeMap<String, String>>,
    /// Taints registered with the node. `Some(vec![])` explicitly clears taints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Extra,
}

/// Node taint
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    /// Taint key
    pub key: String,
    /// Taint value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// NoSchedule, PreferNoSchedule or NoExecute
    pub effect: String,
    /// When the taint was added (NoExecute only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_added: Option<String>,
}

/// File written onto a machine by cloud-init
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct File {
    /// Destination path
    pub path: String,
    /// Owner in `user:group` form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Octal permissions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
    /// Inline content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Remaining fields (encoding, contentFrom, append)
    #[serde(flatten)]
    pub extra: Extra,
}
