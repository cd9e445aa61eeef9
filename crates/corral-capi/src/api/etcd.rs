//! External etcd managed by etcdadm

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Extra, ObjectReference};

/// etcd cluster running on dedicated machines outside the control plane
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "etcdcluster.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "EtcdadmCluster",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase", default)]
pub struct EtcdadmClusterSpec {
    /// Number of etcd machines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Reference to the provider machine template for etcd machines
    pub infrastructure_template: ObjectReference,
    /// Remaining fields (etcdadmConfigSpec, ...)
    #[serde(flatten)]
    pub extra: Extra,
}
