//! Docker (CAPD) infrastructure provider
//!
//! Useful for local development and testing with kind node images.
//!
//! # Generated CAPI Resources
//!
//! 1. **Cluster** and **DockerCluster**
//! 2. **KubeadmControlPlane** with its **DockerMachineTemplate**
//! 3. **EtcdadmCluster** with its **DockerMachineTemplate** (external etcd only)
//! 4. Per worker node group: **MachineDeployment**, **KubeadmConfigTemplate**
//!    and **DockerMachineTemplate**
//!
//! Machine templates embed the node image, which is tagged with the
//! Kubernetes version, so a version upgrade rolls every template.

use corral_common::Result;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{
    generate_cluster, generate_etcdadm_cluster, generate_kubeadm_config_template,
    generate_kubeadm_control_plane, generate_machine_deployment, parse_cluster_objects,
    update_cluster_names, update_control_plane_names, update_worker_names, ClusterConfig,
    InfrastructureProvider, InfrastructureRef, ProviderClusterObjects,
};
use crate::api::providers::{DockerCluster, DockerMachineTemplate};
use crate::client::ObjectReader;
use crate::compare::spec_derivative_eq;
use crate::constants::{DOCKER_INFRASTRUCTURE_API_VERSION, KIND_NODE_IMAGE_REPOSITORY};
use crate::controlplane::{control_plane_parser, parse_control_plane, ControlPlane};
use crate::lookup::{KindMapping, KindRegistry, ParserConfig};
use crate::manifest::{create_cluster_labels, render_documents, CapiManifest};
use crate::name::{
    control_plane_machine_template_name, etcd_machine_template_name, worker_machine_template_name,
};
use crate::rename::ApiRetriever;
use crate::workers::{parse_workers, workers_parser, Workers};

/// Retriever for live DockerMachineTemplates
pub type DockerMachineTemplateRetriever = ApiRetriever<DockerMachineTemplate>;

/// Control plane of a docker cluster
pub type DockerControlPlane = ControlPlane<DockerCluster, DockerMachineTemplate>;

/// Workers of a docker cluster
pub type DockerWorkers = Workers<DockerMachineTemplate>;

const INFRA: InfrastructureRef<'static> = InfrastructureRef {
    api_version: DOCKER_INFRASTRUCTURE_API_VERSION,
    cluster_kind: "DockerCluster",
    machine_template_kind: "DockerMachineTemplate",
};

/// Docker provider kinds
#[derive(Clone, Copy, Debug, Default)]
pub struct Docker;

impl InfrastructureProvider for Docker {
    const NAME: &'static str = "docker";
    type Cluster = DockerCluster;
    type MachineTemplate = DockerMachineTemplate;

    fn machine_templates_equal(new: &DockerMachineTemplate, old: &DockerMachineTemplate) -> bool {
        machine_template_equal(new, old)
    }
}

/// DockerMachineTemplates are equal when the desired spec is satisfied by the
/// live one
pub fn machine_template_equal(new: &DockerMachineTemplate, old: &DockerMachineTemplate) -> bool {
    spec_derivative_eq(&new.spec, &old.spec)
}

/// Registry mapping for DockerCluster
pub fn cluster_mapping() -> KindMapping {
    KindMapping::of::<DockerCluster>()
}

/// Registry mapping for DockerMachineTemplate
pub fn machine_template_mapping() -> KindMapping {
    KindMapping::of::<DockerMachineTemplate>()
}

/// Renders the docker object graph for a [`ClusterConfig`]
#[derive(Clone, Debug)]
pub struct DockerProvider {
    node_image_repository: String,
}

impl Default for DockerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerProvider {
    /// Provider using kind node images
    pub fn new() -> Self {
        Self {
            node_image_repository: KIND_NODE_IMAGE_REPOSITORY.to_string(),
        }
    }

    /// Provider pulling node images from another repository
    pub fn with_node_image_repository(repository: impl Into<String>) -> Self {
        Self {
            node_image_repository: repository.into(),
        }
    }

    /// Node image for the cluster's Kubernetes version
    pub fn node_image(&self, config: &ClusterConfig) -> String {
        format!("{}:{}", self.node_image_repository, config.kubernetes_version())
    }

    /// Generate the DockerCluster resource
    fn generate_docker_cluster(&self, config: &ClusterConfig) -> CapiManifest {
        CapiManifest::new(
            INFRA.api_version,
            INFRA.cluster_kind,
            &config.name,
            config.namespace(),
        )
        .with_labels(create_cluster_labels(&config.name))
        .with_spec(json!({}))
    }

    /// Generate a DockerMachineTemplate named `name`
    fn generate_machine_template(&self, config: &ClusterConfig, name: String) -> CapiManifest {
        let spec = json!({
            "template": {
                "spec": {
                    "customImage": self.node_image(config),
                    "extraMounts": [{
                        "containerPath": "/var/run/docker.sock",
                        "hostPath": "/var/run/docker.sock"
                    }]
                }
            }
        });

        CapiManifest::new(
            INFRA.api_version,
            INFRA.machine_template_kind,
            name,
            config.namespace(),
        )
        .with_labels(create_cluster_labels(&config.name))
        .with_spec(spec)
    }

    /// Control plane objects with initial names
    pub fn control_plane_objects(&self, config: &ClusterConfig) -> Vec<CapiManifest> {
        let mut objects = vec![
            generate_cluster(config, &INFRA),
            self.generate_docker_cluster(config),
            generate_kubeadm_control_plane(config, &INFRA),
            self.generate_machine_template(
                config,
                control_plane_machine_template_name(&config.name),
            ),
        ];
        if let Some(etcd) = generate_etcdadm_cluster(config, &INFRA) {
            objects.push(etcd);
            objects.push(
                self.generate_machine_template(config, etcd_machine_template_name(&config.name)),
            );
        }
        objects
    }

    /// Worker objects with initial names, three per node group
    pub fn worker_objects(&self, config: &ClusterConfig) -> Vec<CapiManifest> {
        config
            .worker_node_groups
            .iter()
            .flat_map(|group| {
                [
                    generate_machine_deployment(config, &INFRA, group),
                    generate_kubeadm_config_template(config, group),
                    self.generate_machine_template(
                        config,
                        worker_machine_template_name(&config.name, &group.name),
                    ),
                ]
            })
            .collect()
    }

    /// Every object of the cluster with initial names
    pub fn objects(&self, config: &ClusterConfig) -> Vec<CapiManifest> {
        let mut objects = self.control_plane_objects(config);
        objects.extend(self.worker_objects(config));
        objects
    }

    /// Control plane for `config`, renamed against the live cluster
    pub async fn control_plane_spec(
        &self,
        reader: &dyn ObjectReader,
        cancel: &CancellationToken,
        config: &ClusterConfig,
    ) -> Result<DockerControlPlane> {
        let stream = render_documents(&self.control_plane_objects(config))?;
        let registry = control_plane_parser(cluster_mapping(), machine_template_mapping())?;
        let mut control_plane = parse_control_plane(&registry, &stream, &parser_config(config))?;

        update_control_plane_names::<Docker>(&mut control_plane, reader, cancel).await?;
        info!(cluster = %config.name, "docker control plane ready");
        Ok(control_plane)
    }

    /// Workers for `config`, renamed against the live cluster
    pub async fn workers_spec(
        &self,
        reader: &dyn ObjectReader,
        cancel: &CancellationToken,
        config: &ClusterConfig,
    ) -> Result<DockerWorkers> {
        let stream = render_documents(&self.worker_objects(config))?;
        let registry: KindRegistry = workers_parser(machine_template_mapping())?;
        let mut workers = parse_workers(&registry, &stream, &parser_config(config))?;

        update_worker_names::<Docker>(&mut workers, reader, cancel).await?;
        info!(cluster = %config.name, groups = workers.groups.len(), "docker workers ready");
        Ok(workers)
    }

    /// Control plane and workers together; fails without partial results
    pub async fn cluster_spec(
        &self,
        reader: &dyn ObjectReader,
        cancel: &CancellationToken,
        config: &ClusterConfig,
    ) -> Result<ProviderClusterObjects<Docker>> {
        let stream = render_documents(&self.objects(config))?;
        let mut objects = parse_cluster_objects::<Docker>(&stream, &parser_config(config))?;
        update_cluster_names::<Docker>(&mut objects, reader, cancel).await?;
        Ok(objects)
    }
}

fn parser_config(config: &ClusterConfig) -> ParserConfig {
    ParserConfig::strict().with_default_namespace(config.namespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::providers::{DockerMachineTemplateSpec, Mount};
    use crate::client::fake::{cluster_failing_on, cluster_with, counting_cluster_with, live};
    use crate::object::name_of;
    use crate::provider::{MachineGroupConfig, WorkerNodeGroupConfig};
    use corral_common::Error;
    use std::collections::BTreeMap;
    use std::sync::atomic::Ordering;

    fn config(version: &str) -> ClusterConfig {
        ClusterConfig {
            name: "mgmt".to_string(),
            namespace: Some("eksa-system".to_string()),
            kubernetes_version: version.to_string(),
            control_plane: MachineGroupConfig { count: 1 },
            external_etcd: Some(MachineGroupConfig { count: 1 }),
            worker_node_groups: vec![WorkerNodeGroupConfig {
                name: "md-0".to_string(),
                count: Some(1),
                labels: BTreeMap::new(),
                taints: None,
            }],
            cluster_network: Default::default(),
        }
    }

    /// Live cluster as first created from `config`
    fn live_objects(config: &ClusterConfig) -> Vec<serde_json::Value> {
        DockerProvider::new().objects(config).iter().map(live).collect()
    }

    mod comparator {
        use super::*;

        fn template(image: &str, mounts: Vec<Mount>) -> DockerMachineTemplate {
            let mut mt = DockerMachineTemplate::new("mgmt-md-0-1", DockerMachineTemplateSpec::default());
            mt.spec.template.spec.custom_image = Some(image.to_string());
            mt.spec.template.spec.extra_mounts = mounts;
            mt
        }

        fn socket() -> Mount {
            Mount {
                container_path: "/var/run/docker.sock".to_string(),
                host_path: "/var/run/docker.sock".to_string(),
                read_only: None,
            }
        }

        #[test]
        fn same_image_is_equal() {
            assert!(machine_template_equal(
                &template("kindest/node:v1.30.2", vec![socket()]),
                &template("kindest/node:v1.30.2", vec![socket()]),
            ));
        }

        #[test]
        fn new_image_is_a_change() {
            assert!(!machine_template_equal(
                &template("kindest/node:v1.30.2", vec![]),
                &template("kindest/node:v1.29.0", vec![]),
            ));
        }

        #[test]
        fn unset_mounts_accept_live_mounts() {
            assert!(machine_template_equal(
                &template("kindest/node:v1.30.2", vec![]),
                &template("kindest/node:v1.30.2", vec![socket()]),
            ));
        }
    }

    mod generation {
        use super::*;

        #[test]
        fn renders_every_object_with_initial_names() {
            let objects = DockerProvider::new().objects(&config("1.30.2"));
            let names: Vec<_> = objects.iter().map(|o| o.display_name()).collect();
            assert_eq!(
                names,
                [
                    "Cluster eksa-system/mgmt",
                    "DockerCluster eksa-system/mgmt",
                    "KubeadmControlPlane eksa-system/mgmt",
                    "DockerMachineTemplate eksa-system/mgmt-control-plane-1",
                    "EtcdadmCluster eksa-system/mgmt-etcd",
                    "DockerMachineTemplate eksa-system/mgmt-etcd-1",
                    "MachineDeployment eksa-system/mgmt-md-0",
                    "KubeadmConfigTemplate eksa-system/mgmt-md-0-1",
                    "DockerMachineTemplate eksa-system/mgmt-md-0-1",
                ]
            );
        }

        #[test]
        fn node_image_follows_the_kubernetes_version() {
            assert_eq!(
                DockerProvider::new().node_image(&config("1.30.2")),
                "kindest/node:v1.30.2"
            );
            assert_eq!(
                DockerProvider::with_node_image_repository("mirror.local/kind/node")
                    .node_image(&config("v1.29.0")),
                "mirror.local/kind/node:v1.29.0"
            );
        }
    }

    mod end_to_end {
        use super::*;

        #[tokio::test]
        async fn first_creation_keeps_generation_one() {
            let reader = cluster_with(vec![]);
            let cancel = CancellationToken::new();

            let objects = DockerProvider::new()
                .cluster_spec(&reader, &cancel, &config("1.30.2"))
                .await
                .unwrap();
            assert_eq!(
                name_of(&objects.control_plane.control_plane_machine_template),
                "mgmt-control-plane-1"
            );
            assert_eq!(objects.workers.groups.len(), 1);
            assert_eq!(objects.objects().unwrap().len(), 9);
        }

        #[tokio::test]
        async fn rerun_without_changes_keeps_every_name() {
            let reader = cluster_with(live_objects(&config("1.30.2")));
            let cancel = CancellationToken::new();

            let cp = DockerProvider::new()
                .control_plane_spec(&reader, &cancel, &config("1.30.2"))
                .await
                .unwrap();
            assert_eq!(name_of(&cp.control_plane_machine_template), "mgmt-control-plane-1");
            assert_eq!(name_of(cp.etcd_machine_template.as_ref().unwrap()), "mgmt-etcd-1");
        }

        #[tokio::test]
        async fn upgrade_rolls_machine_templates_but_not_bootstrap_configs() {
            let reader = cluster_with(live_objects(&config("1.29.0")));
            let cancel = CancellationToken::new();
            let provider = DockerProvider::new();

            let cp = provider
                .control_plane_spec(&reader, &cancel, &config("1.30.2"))
                .await
                .unwrap();
            assert_eq!(name_of(&cp.control_plane_machine_template), "mgmt-control-plane-2");
            assert_eq!(
                cp.kubeadm_control_plane.spec.machine_template.infrastructure_ref.name,
                "mgmt-control-plane-2"
            );
            assert_eq!(
                cp.etcd_cluster.as_ref().unwrap().spec.infrastructure_template.name,
                "mgmt-etcd-2"
            );

            let workers = provider
                .workers_spec(&reader, &cancel, &config("1.30.2"))
                .await
                .unwrap();
            let group = &workers.groups[0];
            assert_eq!(name_of(&group.provider_machine_template), "mgmt-md-0-2");
            assert_eq!(name_of(&group.kubeadm_config_template), "mgmt-md-0-1");
        }

        #[tokio::test]
        async fn new_node_labels_roll_the_bootstrap_config() {
            let reader = cluster_with(live_objects(&config("1.30.2")));
            let cancel = CancellationToken::new();
            let mut desired = config("1.30.2");
            desired.worker_node_groups[0]
                .labels
                .insert("tier".to_string(), "web".to_string());

            let workers = DockerProvider::new()
                .workers_spec(&reader, &cancel, &desired)
                .await
                .unwrap();
            let group = &workers.groups[0];
            assert_eq!(name_of(&group.kubeadm_config_template), "mgmt-md-0-2");
            assert_eq!(name_of(&group.provider_machine_template), "mgmt-md-0-1");
        }

        #[tokio::test]
        async fn read_failure_names_the_provider() {
            let reader = cluster_failing_on(live_objects(&config("1.30.2")), "KubeadmControlPlane");
            let cancel = CancellationToken::new();

            let err = DockerProvider::new()
                .control_plane_spec(&reader, &cancel, &config("1.30.2"))
                .await
                .unwrap_err();
            assert!(err.to_string().starts_with(
                "updating docker immutable object names: reading KubeadmControlPlane eksa-system/mgmt from API"
            ));
        }

        #[tokio::test]
        async fn cancellation_is_not_wrapped() {
            let (reader, reads) = counting_cluster_with(live_objects(&config("1.29.0")));
            let cancel = CancellationToken::new();
            cancel.cancel();

            let err = DockerProvider::new()
                .cluster_spec(&reader, &cancel, &config("1.30.2"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Cancelled));
            assert_eq!(reads.load(Ordering::SeqCst), 0);
        }
    }
}
