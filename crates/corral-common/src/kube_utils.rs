//! Kubernetes client construction and dynamic API resource helpers

use std::path::Path;
use std::time::Duration;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};

use crate::Error;

/// Default connect timeout for API server connections
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read timeout for API server responses
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path
///
/// Without a path the config is inferred (KUBECONFIG, ~/.kube/config, then
/// in-cluster service account).
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    create_client_with_timeout(kubeconfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client from an optional kubeconfig path with custom timeouts
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig {}: {}", path.display(), e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };
    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);

    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// Split an apiVersion into (group, version). Core resources have an empty group.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an ApiResource for a kind so it can be read through `Api<DynamicObject>`
///
/// ```ignore
/// let ar = build_api_resource("cluster.x-k8s.io/v1beta1", "MachineDeployment");
/// let api: Api<DynamicObject> = Api::namespaced_with(client, "default", &ar);
/// ```
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Plural resource names for kinds where lowercasing plus "s" is wrong
/// or ambiguous.
const KIND_PLURALS: &[(&str, &str)] = &[
    ("cluster", "clusters"),
    ("machinedeployment", "machinedeployments"),
    ("kubeadmcontrolplane", "kubeadmcontrolplanes"),
    ("kubeadmconfigtemplate", "kubeadmconfigtemplates"),
    ("etcdadmcluster", "etcdadmclusters"),
    ("dockercluster", "dockerclusters"),
    ("dockermachinetemplate", "dockermachinetemplates"),
    ("awssnowcluster", "awssnowclusters"),
    ("awssnowmachinetemplate", "awssnowmachinetemplates"),
    ("awssnowippool", "awssnowippools"),
];

/// Pluralize a kind into its resource name
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if let Some((_, plural)) = KIND_PLURALS.iter().find(|(singular, _)| *singular == lower) {
        return (*plural).to_string();
    }

    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if let Some(stem) = lower.strip_suffix('y') {
        if stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            format!("{}s", lower)
        } else {
            format!("{}ies", stem)
        }
    } else {
        format!("{}s", lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_version_splits_into_group_and_version() {
        assert_eq!(
            parse_api_version("cluster.x-k8s.io/v1beta1"),
            ("cluster.x-k8s.io".to_string(), "v1beta1".to_string())
        );
        assert_eq!(
            parse_api_version("v1"),
            (String::new(), "v1".to_string())
        );
    }

    #[test]
    fn api_resource_for_capi_kinds() {
        let ar = build_api_resource("bootstrap.cluster.x-k8s.io/v1beta1", "KubeadmConfigTemplate");
        assert_eq!(ar.group, "bootstrap.cluster.x-k8s.io");
        assert_eq!(ar.version, "v1beta1");
        assert_eq!(ar.kind, "KubeadmConfigTemplate");
        assert_eq!(ar.plural, "kubeadmconfigtemplates");
    }

    #[test]
    fn pluralizes_known_and_unknown_kinds() {
        assert_eq!(pluralize_kind("AWSSnowMachineTemplate"), "awssnowmachinetemplates");
        assert_eq!(pluralize_kind("EtcdadmCluster"), "etcdadmclusters");
        assert_eq!(pluralize_kind("Ingress"), "ingresses");
        assert_eq!(pluralize_kind("NetworkPolicy"), "networkpolicies");
        assert_eq!(pluralize_kind("Gateway"), "gateways");
        assert_eq!(pluralize_kind("Secret"), "secrets");
    }
}
