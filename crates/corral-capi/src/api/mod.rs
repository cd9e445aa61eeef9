//! Typed Cluster API objects
//!
//! Only the fields the object graph and the comparators look at are modeled
//! explicitly. Everything else is preserved through flattened `extra` maps so
//! a manifest survives a parse/serialize cycle unchanged.

mod cluster;
mod etcd;
mod kubeadm;
pub mod providers;

pub use cluster::{
    Bootstrap, Cluster, ClusterSpec, MachineDeployment, MachineDeploymentSpec, MachineSpec,
    MachineTemplateSpec,
};
pub use etcd::{EtcdadmCluster, EtcdadmClusterSpec};
pub use kubeadm::{
    File, JoinConfiguration, KubeadmConfigSpec, KubeadmConfigTemplate,
    KubeadmConfigTemplateResource, KubeadmConfigTemplateSpec, KubeadmControlPlane,
    KubeadmControlPlaneMachineTemplate, KubeadmControlPlaneSpec, NodeRegistrationOptions, Taint,
};

use std::collections::BTreeMap;

use kube::{Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fields not modeled explicitly, kept verbatim
pub type Extra = BTreeMap<String, serde_json::Value>;

/// Reference from one Cluster API object to another
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// API version of the referenced object
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    /// Kind of the referenced object
    #[serde(default)]
    pub kind: String,
    /// Name of the referenced object
    #[serde(default)]
    pub name: String,
    /// Namespace of the referenced object; empty means the referrer's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectReference {
    /// Build a reference pointing at an existing object
    pub fn to<K>(object: &K) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        Self {
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            name: object.name_any(),
            namespace: object.namespace(),
        }
    }

    /// Namespace of the referenced object, falling back to the referrer's
    pub fn namespace_or<'a>(&'a self, referrer_namespace: &'a str) -> &'a str {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => referrer_namespace,
        }
    }
}
