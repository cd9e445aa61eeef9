//! Centralized constants for the corral-capi crate
//!
//! API groups and versions, well-known labels and name suffixes shared by the
//! object graph and the providers.

// =============================================================================
// Cluster API groups and versions
// =============================================================================

/// Core Cluster API version (Cluster, MachineDeployment)
pub const CAPI_CLUSTER_API_VERSION: &str = "cluster.x-k8s.io/v1beta1";

/// Kubeadm bootstrap API version (KubeadmConfigTemplate)
pub const CAPI_BOOTSTRAP_API_VERSION: &str = "bootstrap.cluster.x-k8s.io/v1beta1";

/// Kubeadm control plane API version (KubeadmControlPlane)
pub const CAPI_CONTROLPLANE_API_VERSION: &str = "controlplane.cluster.x-k8s.io/v1beta1";

/// etcdadm cluster API version (EtcdadmCluster)
pub const ETCD_CLUSTER_API_VERSION: &str = "etcdcluster.cluster.x-k8s.io/v1beta1";

/// Docker (CAPD) infrastructure API version
pub const DOCKER_INFRASTRUCTURE_API_VERSION: &str = "infrastructure.cluster.x-k8s.io/v1beta1";

// =============================================================================
// Labels
// =============================================================================

/// Label carrying the owning cluster name
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Standard managed-by label key
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Label marking the worker node group a node belongs to
pub const NODE_GROUP_LABEL: &str = "corral.dev/node-group";

// =============================================================================
// Names
// =============================================================================

/// Suffix of the control plane machine template base name
pub const CONTROL_PLANE_TEMPLATE_SUFFIX: &str = "control-plane";

/// Suffix of the external etcd objects
pub const ETCD_SUFFIX: &str = "etcd";

/// Version given to an immutable object the first time it is created
pub const INITIAL_NAME_VERSION: u64 = 1;

// =============================================================================
// Node bootstrap defaults
// =============================================================================

/// containerd socket used by kubeadm node registration
pub const CONTAINERD_SOCKET: &str = "/var/run/containerd/containerd.sock";

/// Default pod CIDR when the cluster description does not set one
pub const DEFAULT_POD_CIDR: &str = "192.168.0.0/16";

/// Default service CIDR when the cluster description does not set one
pub const DEFAULT_SERVICE_CIDR: &str = "10.96.0.0/12";

/// Image repository for kind node images used by CAPD machines
pub const KIND_NODE_IMAGE_REPOSITORY: &str = "kindest/node";
