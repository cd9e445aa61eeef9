//! Infrastructure providers
//!
//! A provider contributes two Cluster API kinds (its cluster and its machine
//! template) and decides when two of its machine templates are equivalent.
//! The generators in this module render the provider-independent part of the
//! object graph from a [`ClusterConfig`]; provider modules add their own kinds.

pub mod docker;
pub mod snow;

use std::collections::BTreeMap;

use corral_common::{yaml, Error, Result, DEFAULT_NAMESPACE};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::api::Taint;
use crate::client::ObjectReader;
use crate::constants::{
    CAPI_BOOTSTRAP_API_VERSION, CAPI_CLUSTER_API_VERSION, CAPI_CONTROLPLANE_API_VERSION,
    CONTAINERD_SOCKET, DEFAULT_POD_CIDR, DEFAULT_SERVICE_CIDR, ETCD_CLUSTER_API_VERSION,
    NODE_GROUP_LABEL,
};
use crate::controlplane::{build_control_plane, register_control_plane_kinds, ControlPlane};
use crate::lookup::{KindMapping, KindRegistry, ObjectLookup, ParserConfig};
use crate::manifest::{create_cluster_labels, CapiManifest};
use crate::name::{
    control_plane_machine_template_name, control_plane_name, default_kubeadm_config_template_name,
    etcd_cluster_name, etcd_machine_template_name, machine_deployment_name,
    worker_machine_template_name,
};
use crate::object::CapiObject;
use crate::rename::ApiRetriever;
use crate::workers::{build_workers, register_worker_kinds, Workers};

/// Taint effects kubelet accepts
const TAINT_EFFECTS: [&str; 3] = ["NoSchedule", "PreferNoSchedule", "NoExecute"];

/// An infrastructure provider's kinds and machine template comparison
pub trait InfrastructureProvider: Send + Sync + 'static {
    /// Short name used in logs and error messages
    const NAME: &'static str;

    /// Provider cluster kind, e.g. DockerCluster
    type Cluster: CapiObject;

    /// Provider machine template kind, e.g. DockerMachineTemplate
    type MachineTemplate: CapiObject;

    /// Whether `new` can keep `old`'s name
    fn machine_templates_equal(new: &Self::MachineTemplate, old: &Self::MachineTemplate) -> bool;
}

// ============================================================================
// Declarative cluster description
// ============================================================================

/// Provider-agnostic description of a cluster
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Cluster name
    pub name: String,
    /// Namespace for the Cluster API objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Kubernetes version, with or without a leading `v`
    pub kubernetes_version: String,
    /// Control plane machines
    pub control_plane: MachineGroupConfig,
    /// Dedicated etcd machines; unset means stacked etcd
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_etcd: Option<MachineGroupConfig>,
    /// Worker node groups
    #[serde(default)]
    pub worker_node_groups: Vec<WorkerNodeGroupConfig>,
    /// Pod and service networks
    #[serde(default)]
    pub cluster_network: ClusterNetworkConfig,
}

/// Machine count of a fixed-role group
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MachineGroupConfig {
    /// Number of machines
    pub count: i32,
}

/// One worker node group
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerNodeGroupConfig {
    /// Group name, unique within the cluster
    pub name: String,
    /// Number of machines; unset leaves scaling to an autoscaler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,
    /// Node labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Node taints; an empty list clears taints, unset leaves kubeadm's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,
}

/// Pod and service CIDRs
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterNetworkConfig {
    /// Pod CIDR blocks
    pub pods: Vec<String>,
    /// Service CIDR blocks
    pub services: Vec<String>,
}

impl Default for ClusterNetworkConfig {
    fn default() -> Self {
        Self {
            pods: vec![DEFAULT_POD_CIDR.to_string()],
            services: vec![DEFAULT_SERVICE_CIDR.to_string()],
        }
    }
}

impl ClusterConfig {
    /// Parse and validate a YAML or JSON cluster description
    pub fn from_yaml(input: &str) -> Result<Self> {
        let value = yaml::parse_document(input)?;
        if let Some(version) = value.get("kubernetesVersion").filter(|v| v.is_number()) {
            return Err(Error::validation_for_field(
                "kubernetesVersion",
                format!(
                    "kubernetesVersion {version} was read as a number, quote it (e.g. kubernetesVersion: \"1.30\")"
                ),
            ));
        }
        let config: Self =
            serde_json::from_value(value).map_err(|e| Error::serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Namespace of the generated objects
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Kubernetes version with a leading `v`
    pub fn kubernetes_version(&self) -> String {
        format!("v{}", self.kubernetes_version.trim_start_matches('v'))
    }

    /// Check the description before anything is rendered from it
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::validation_for_field("name", "cluster name is required"));
        }
        validate_k8s_version(&self.kubernetes_version)?;

        if self.control_plane.count < 1 {
            return Err(Error::validation_for_field(
                "controlPlane.count",
                "control plane needs at least one machine",
            ));
        }
        if let Some(etcd) = &self.external_etcd {
            if etcd.count < 1 || etcd.count % 2 == 0 {
                return Err(Error::validation_for_field(
                    "externalEtcd.count",
                    format!("etcd machine count must be odd, got {}", etcd.count),
                ));
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for group in &self.worker_node_groups {
            if group.name.is_empty() {
                return Err(Error::validation_for_field(
                    "workerNodeGroups.name",
                    "worker node group name is required",
                ));
            }
            if !seen.insert(group.name.as_str()) {
                return Err(Error::validation_for_field(
                    "workerNodeGroups.name",
                    format!("duplicate worker node group {}", group.name),
                ));
            }
            if group.count.is_some_and(|count| count < 0) {
                return Err(Error::validation_for_field(
                    "workerNodeGroups.count",
                    format!("worker node group {} has a negative count", group.name),
                ));
            }
            for taint in group.taints.iter().flatten() {
                if !TAINT_EFFECTS.contains(&taint.effect.as_str()) {
                    return Err(Error::validation_for_field(
                        "workerNodeGroups.taints",
                        format!("taint {} has invalid effect {}", taint.key, taint.effect),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Validate Kubernetes version format
///
/// Accepts versions in format "1.x.x" or "v1.x.x".
pub fn validate_k8s_version(version: &str) -> Result<()> {
    if !version.starts_with("1.") && !version.starts_with("v1.") {
        return Err(Error::validation(format!(
            "invalid kubernetes version: {version}, expected format: 1.x.x or v1.x.x"
        )));
    }
    Ok(())
}

// ============================================================================
// Provider-independent generators
// ============================================================================

/// Kinds a provider plugs into the object graph
#[derive(Clone, Copy, Debug)]
pub struct InfrastructureRef<'a> {
    /// Full API version (e.g., "infrastructure.cluster.x-k8s.io/v1beta1")
    pub api_version: &'a str,
    /// Kind for the infrastructure cluster (e.g., "DockerCluster")
    pub cluster_kind: &'a str,
    /// Kind for machine templates (e.g., "DockerMachineTemplate")
    pub machine_template_kind: &'a str,
}

fn reference(api_version: &str, kind: &str, name: &str) -> serde_json::Value {
    json!({
        "apiVersion": api_version,
        "kind": kind,
        "name": name
    })
}

/// Generate the Cluster, pointing at the control plane, provider cluster and
/// external etcd when there is one
pub fn generate_cluster(config: &ClusterConfig, infra: &InfrastructureRef) -> CapiManifest {
    let mut spec = json!({
        "clusterNetwork": {
            "pods": {
                "cidrBlocks": config.cluster_network.pods
            },
            "services": {
                "cidrBlocks": config.cluster_network.services
            }
        },
        "controlPlaneRef": reference(
            CAPI_CONTROLPLANE_API_VERSION,
            "KubeadmControlPlane",
            &control_plane_name(&config.name),
        ),
        "infrastructureRef": reference(infra.api_version, infra.cluster_kind, &config.name)
    });
    if config.external_etcd.is_some() {
        spec["managedExternalEtcdRef"] = reference(
            ETCD_CLUSTER_API_VERSION,
            "EtcdadmCluster",
            &etcd_cluster_name(&config.name),
        );
    }

    CapiManifest::new(
        CAPI_CLUSTER_API_VERSION,
        "Cluster",
        &config.name,
        config.namespace(),
    )
    .with_labels(create_cluster_labels(&config.name))
    .with_spec(spec)
}

/// Generate the KubeadmControlPlane referencing the initial control plane
/// machine template
pub fn generate_kubeadm_control_plane(
    config: &ClusterConfig,
    infra: &InfrastructureRef,
) -> CapiManifest {
    let node_registration = json!({
        "criSocket": CONTAINERD_SOCKET,
        "kubeletExtraArgs": {
            "eviction-hard": "nodefs.available<0%,nodefs.inodesFree<0%,imagefs.available<0%"
        }
    });

    let mut cluster_configuration = json!({
        "apiServer": {
            "certSANs": ["localhost", "127.0.0.1"]
        },
        "controllerManager": {
            "extraArgs": {"enable-hostpath-provisioner": "true"}
        }
    });
    if config.external_etcd.is_some() {
        cluster_configuration["etcd"] = json!({
            "external": {
                "endpoints": [],
                "caFile": "/etc/kubernetes/pki/etcd/ca.crt",
                "certFile": "/etc/kubernetes/pki/apiserver-etcd-client.crt",
                "keyFile": "/etc/kubernetes/pki/apiserver-etcd-client.key"
            }
        });
    }

    let spec = json!({
        "replicas": config.control_plane.count,
        "version": config.kubernetes_version(),
        "machineTemplate": {
            "infrastructureRef": reference(
                infra.api_version,
                infra.machine_template_kind,
                &control_plane_machine_template_name(&config.name),
            )
        },
        "kubeadmConfigSpec": {
            "clusterConfiguration": cluster_configuration,
            "initConfiguration": {
                "nodeRegistration": node_registration.clone()
            },
            "joinConfiguration": {
                "nodeRegistration": node_registration
            }
        }
    });

    CapiManifest::new(
        CAPI_CONTROLPLANE_API_VERSION,
        "KubeadmControlPlane",
        control_plane_name(&config.name),
        config.namespace(),
    )
    .with_labels(create_cluster_labels(&config.name))
    .with_spec(spec)
}

/// Generate the EtcdadmCluster for clusters with external etcd
pub fn generate_etcdadm_cluster(
    config: &ClusterConfig,
    infra: &InfrastructureRef,
) -> Option<CapiManifest> {
    let etcd = config.external_etcd.as_ref()?;
    let spec = json!({
        "replicas": etcd.count,
        "etcdadmConfigSpec": {
            "etcdadmBuiltin": true
        },
        "infrastructureTemplate": reference(
            infra.api_version,
            infra.machine_template_kind,
            &etcd_machine_template_name(&config.name),
        )
    });

    Some(
        CapiManifest::new(
            ETCD_CLUSTER_API_VERSION,
            "EtcdadmCluster",
            etcd_cluster_name(&config.name),
            config.namespace(),
        )
        .with_labels(create_cluster_labels(&config.name))
        .with_spec(spec),
    )
}

/// Generate a worker group's MachineDeployment referencing its initial
/// templates
pub fn generate_machine_deployment(
    config: &ClusterConfig,
    infra: &InfrastructureRef,
    group: &WorkerNodeGroupConfig,
) -> CapiManifest {
    let mut labels = create_cluster_labels(&config.name);
    labels.insert(NODE_GROUP_LABEL.to_string(), group.name.clone());

    let mut spec = json!({
        "clusterName": config.name,
        "selector": {
            "matchLabels": {}
        },
        "template": {
            "metadata": {
                "labels": BTreeMap::from([(NODE_GROUP_LABEL, group.name.as_str())])
            },
            "spec": {
                "clusterName": config.name,
                "version": config.kubernetes_version(),
                "bootstrap": {
                    "configRef": reference(
                        CAPI_BOOTSTRAP_API_VERSION,
                        "KubeadmConfigTemplate",
                        &default_kubeadm_config_template_name(&config.name, &group.name),
                    )
                },
                "infrastructureRef": reference(
                    infra.api_version,
                    infra.machine_template_kind,
                    &worker_machine_template_name(&config.name, &group.name),
                )
            }
        }
    });
    if let Some(count) = group.count {
        spec["replicas"] = json!(count);
    }

    CapiManifest::new(
        CAPI_CLUSTER_API_VERSION,
        "MachineDeployment",
        machine_deployment_name(&config.name, &group.name),
        config.namespace(),
    )
    .with_labels(labels)
    .with_spec(spec)
}

/// `node-labels` kubelet argument for a worker group
pub fn node_labels_arg(group: &WorkerNodeGroupConfig) -> String {
    let mut labels = group.labels.clone();
    labels.insert(NODE_GROUP_LABEL.to_string(), group.name.clone());
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Generate a worker group's KubeadmConfigTemplate
pub fn generate_kubeadm_config_template(
    config: &ClusterConfig,
    group: &WorkerNodeGroupConfig,
) -> CapiManifest {
    let mut node_registration = json!({
        "criSocket": CONTAINERD_SOCKET,
        "kubeletExtraArgs": {
            "eviction-hard": "nodefs.available<0%,nodefs.inodesFree<0%,imagefs.available<0%",
            "node-labels": node_labels_arg(group)
        }
    });
    if let Some(taints) = &group.taints {
        node_registration["taints"] = json!(taints);
    }

    let spec = json!({
        "template": {
            "spec": {
                "joinConfiguration": {
                    "nodeRegistration": node_registration
                }
            }
        }
    });

    CapiManifest::new(
        CAPI_BOOTSTRAP_API_VERSION,
        "KubeadmConfigTemplate",
        default_kubeadm_config_template_name(&config.name, &group.name),
        config.namespace(),
    )
    .with_labels(create_cluster_labels(&config.name))
    .with_spec(spec)
}

// ============================================================================
// Parsing and renaming per provider
// ============================================================================

/// Registry holding every kind of a cluster's object graph for provider `P`
pub fn cluster_parser<P: InfrastructureProvider>() -> Result<KindRegistry> {
    let mut registry = KindRegistry::new();
    register_control_plane_kinds(&mut registry)
        .map_err(|e| Error::context("registering base control plane kinds", e))?;
    register_worker_kinds(&mut registry)
        .map_err(|e| Error::context("registering base worker kinds", e))?;
    registry
        .register_all([
            KindMapping::of::<P::Cluster>(),
            KindMapping::of::<P::MachineTemplate>(),
        ])
        .map_err(|e| Error::context(format!("registering {} kinds", P::NAME), e))?;
    Ok(registry)
}

/// A cluster's control plane and workers
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterObjects<C, M> {
    /// Control plane aggregate
    pub control_plane: ControlPlane<C, M>,
    /// Workers aggregate
    pub workers: Workers<M>,
}

impl<C: CapiObject, M: CapiObject> ClusterObjects<C, M> {
    /// Assemble both aggregates from one lookup
    pub fn from_lookup(lookup: &ObjectLookup) -> Result<Self> {
        Ok(Self {
            control_plane: build_control_plane(lookup)?,
            workers: build_workers(lookup)?,
        })
    }

    /// Every object of the cluster, control plane first
    pub fn objects(&self) -> Result<Vec<CapiManifest>> {
        let mut objects = self.control_plane.objects()?;
        objects.extend(self.workers.objects()?);
        Ok(objects)
    }
}

/// Objects of a cluster on provider `P`
pub type ProviderClusterObjects<P> = ClusterObjects<
    <P as InfrastructureProvider>::Cluster,
    <P as InfrastructureProvider>::MachineTemplate,
>;

/// Parse a full object stream for provider `P` and assemble it
pub fn parse_cluster_objects<P: InfrastructureProvider>(
    input: &str,
    config: &ParserConfig,
) -> Result<ProviderClusterObjects<P>> {
    let lookup = cluster_parser::<P>()?.parse(input, config)?;
    ClusterObjects::from_lookup(&lookup)
}

fn update_context<P: InfrastructureProvider>(e: Error) -> Error {
    Error::context(format!("updating {} immutable object names", P::NAME), e)
}

/// Run the rename protocol on a control plane of provider `P`
pub async fn update_control_plane_names<P: InfrastructureProvider>(
    control_plane: &mut ControlPlane<P::Cluster, P::MachineTemplate>,
    reader: &dyn ObjectReader,
    cancel: &CancellationToken,
) -> Result<()> {
    control_plane
        .update_immutable_object_names(
            reader,
            cancel,
            &ApiRetriever::<P::MachineTemplate>::new(),
            &P::machine_templates_equal,
        )
        .await
        .map_err(update_context::<P>)
}

/// Run the rename protocol on the workers of provider `P`
pub async fn update_worker_names<P: InfrastructureProvider>(
    workers: &mut Workers<P::MachineTemplate>,
    reader: &dyn ObjectReader,
    cancel: &CancellationToken,
) -> Result<()> {
    workers
        .update_immutable_object_names(
            reader,
            cancel,
            &ApiRetriever::<P::MachineTemplate>::new(),
            &P::machine_templates_equal,
        )
        .await
        .map_err(update_context::<P>)
}

/// Run the rename protocol on a whole cluster
///
/// Either both aggregates are updated or, on error, neither is.
pub async fn update_cluster_names<P: InfrastructureProvider>(
    objects: &mut ProviderClusterObjects<P>,
    reader: &dyn ObjectReader,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut next = objects.clone();
    update_control_plane_names::<P>(&mut next.control_plane, reader, cancel).await?;
    update_worker_names::<P>(&mut next.workers, reader, cancel).await?;
    *objects = next;
    Ok(())
}
