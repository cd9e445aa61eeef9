//! Versioned names for immutable objects
//!
//! Immutable Cluster API objects (machine templates, bootstrap config
//! templates) cannot be edited in place. Each semantic change gets a fresh
//! object named `<base>-<N>`: created with `N = 1`, incremented by one per
//! change. The base may itself contain hyphens and digits; only the rightmost
//! `-<digits>` suffix is the version.

use std::collections::BTreeMap;

use corral_common::{Error, Result};
use tracing::warn;

use crate::constants::{CONTROL_PLANE_TEMPLATE_SUFFIX, ETCD_SUFFIX, INITIAL_NAME_VERSION};

/// `<base>-<version>`
pub fn object_name(base: &str, version: u64) -> String {
    format!("{base}-{version}")
}

/// Name an immutable object gets the first time it is created
pub fn default_object_name(base: &str) -> String {
    object_name(base, INITIAL_NAME_VERSION)
}

/// Split a versioned name into base and version
pub fn parse_name(name: &str) -> Result<(&str, u64)> {
    let (base, suffix) = name
        .rsplit_once('-')
        .ok_or_else(|| Error::name_format(name))?;
    if base.is_empty() || suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::name_format(name));
    }
    let version = suffix.parse::<u64>().map_err(|_| Error::name_format(name))?;
    Ok((base, version))
}

/// Next version of a name: `cluster-md-0-7` becomes `cluster-md-0-8`
pub fn increment_name(name: &str) -> Result<String> {
    let (base, version) = parse_name(name)?;
    let next = version.checked_add(1).ok_or_else(|| Error::name_format(name))?;
    Ok(object_name(base, next))
}

/// Increment `name`, falling back to `default` when it is not versioned
pub fn increment_name_with_fallback_default(name: &str, default: &str) -> String {
    match increment_name(name) {
        Ok(next) => next,
        Err(e) => {
            warn!(name = %name, default = %default, error = %e, "name is not versioned, using default");
            default.to_string()
        }
    }
}

/// KubeadmControlPlane name; the control plane is named after its cluster
pub fn control_plane_name(cluster_name: &str) -> String {
    cluster_name.to_string()
}

/// Initial name of the control plane machine template
pub fn control_plane_machine_template_name(cluster_name: &str) -> String {
    default_object_name(&format!("{cluster_name}-{CONTROL_PLANE_TEMPLATE_SUFFIX}"))
}

/// EtcdadmCluster name
pub fn etcd_cluster_name(cluster_name: &str) -> String {
    format!("{cluster_name}-{ETCD_SUFFIX}")
}

/// Initial name of the etcd machine template
pub fn etcd_machine_template_name(cluster_name: &str) -> String {
    default_object_name(&etcd_cluster_name(cluster_name))
}

/// MachineDeployment name for a worker node group
pub fn machine_deployment_name(cluster_name: &str, node_group: &str) -> String {
    format!("{cluster_name}-{node_group}")
}

/// Initial name of a worker group's KubeadmConfigTemplate
pub fn default_kubeadm_config_template_name(cluster_name: &str, node_group: &str) -> String {
    default_object_name(&machine_deployment_name(cluster_name, node_group))
}

/// Initial name of a worker group's provider machine template
pub fn worker_machine_template_name(cluster_name: &str, node_group: &str) -> String {
    default_object_name(&machine_deployment_name(cluster_name, node_group))
}

/// MachineHealthCheck name for control plane machines
pub fn control_plane_machine_health_check_name(cluster_name: &str) -> String {
    format!("{cluster_name}-kcp-unhealthy")
}

/// MachineHealthCheck name for a worker group
pub fn worker_machine_health_check_name(cluster_name: &str, node_group: &str) -> String {
    format!("{cluster_name}-{node_group}-worker-unhealthy")
}

/// Secret holding the cluster CA
pub fn cluster_ca_secret_name(cluster_name: &str) -> String {
    format!("{cluster_name}-ca")
}

/// Secret holding the admin kubeconfig
pub fn cluster_kubeconfig_secret_name(cluster_name: &str) -> String {
    format!("{cluster_name}-kubeconfig")
}

/// Initial machine template name for every worker node group, keyed by group
pub fn initial_template_names_for_workers<'a>(
    cluster_name: &str,
    node_groups: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<String, String> {
    node_groups
        .into_iter()
        .map(|group| {
            (
                group.to_string(),
                worker_machine_template_name(cluster_name, group),
            )
        })
        .collect()
}
