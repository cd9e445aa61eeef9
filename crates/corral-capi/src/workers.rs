//! Worker node group aggregate
//!
//! Each group is a MachineDeployment with the KubeadmConfigTemplate and the
//! provider machine template it references. Both templates are immutable, so
//! a change to either rolls the deployment's machines onto a newly named one.

use corral_common::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{KubeadmConfigTemplate, MachineDeployment, ObjectReference};
use crate::client::ObjectReader;
use crate::compare::kubeadm_config_template_equal;
use crate::lookup::{KindMapping, KindRegistry, ObjectLookup, ParserConfig};
use crate::manifest::CapiManifest;
use crate::object::{kind_of, name_of, namespace_of, set_name, CapiObject};
use crate::rename::{
    ensure_new_name_if_changed, read_parent, ApiRetriever, ObjectComparator, ObjectRetriever,
};

/// One worker node group
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerGroup<M> {
    /// The deployment owning the group's machines
    pub machine_deployment: MachineDeployment,
    /// Bootstrap config referenced by `spec.template.spec.bootstrap.configRef`
    pub kubeadm_config_template: KubeadmConfigTemplate,
    /// Machine template referenced by `spec.template.spec.infrastructureRef`
    pub provider_machine_template: M,
}

impl<M: CapiObject> WorkerGroup<M> {
    /// The group's objects as manifests
    pub fn objects(&self) -> Result<Vec<CapiManifest>> {
        Ok(vec![
            CapiManifest::from_object(&self.machine_deployment)?,
            CapiManifest::from_object(&self.kubeadm_config_template)?,
            CapiManifest::from_object(&self.provider_machine_template)?,
        ])
    }

    /// Rename the group's templates that changed against the live ones
    ///
    /// A group whose MachineDeployment does not exist yet keeps its names.
    /// On error `self` is left untouched.
    pub async fn update_immutable_object_names(
        &mut self,
        reader: &dyn ObjectReader,
        cancel: &CancellationToken,
        retriever: &dyn ObjectRetriever<M>,
        comparator: &dyn ObjectComparator<M>,
    ) -> Result<()> {
        let name = name_of(&self.machine_deployment);
        let namespace = namespace_of(&self.machine_deployment);
        let Some(live) = read_parent::<MachineDeployment>(reader, cancel, &name, &namespace).await?
        else {
            return Ok(());
        };

        let mut next = self.clone();
        let live_machine = live.spec.template.spec;

        set_name(
            &mut next.provider_machine_template,
            live_machine.infrastructure_ref.name,
        );
        let template = ensure_new_name_if_changed(
            reader,
            cancel,
            retriever,
            comparator,
            &next.provider_machine_template,
        )
        .await?;
        next.machine_deployment
            .spec
            .template
            .spec
            .infrastructure_ref
            .name = name_of(&template);
        next.provider_machine_template = template;

        match live_machine.bootstrap.config_ref {
            Some(config_ref) => {
                set_name(&mut next.kubeadm_config_template, config_ref.name);
                let config = ensure_new_name_if_changed(
                    reader,
                    cancel,
                    &ApiRetriever::<KubeadmConfigTemplate>::new(),
                    &kubeadm_config_template_equal,
                    &next.kubeadm_config_template,
                )
                .await?;
                next.machine_deployment
                    .spec
                    .template
                    .spec
                    .bootstrap
                    .config_ref
                    .get_or_insert_with(|| ObjectReference::to(&config))
                    .name = name_of(&config);
                next.kubeadm_config_template = config;
            }
            None => {
                debug!(machine_deployment = %name, "live deployment has no bootstrap config reference, keeping initial name");
            }
        }

        *self = next;
        Ok(())
    }
}

/// Every worker node group of a cluster, in stream order
#[derive(Clone, Debug, PartialEq)]
pub struct Workers<M> {
    /// The groups
    pub groups: Vec<WorkerGroup<M>>,
}

impl<M> Default for Workers<M> {
    fn default() -> Self {
        Self { groups: Vec::new() }
    }
}

impl<M: CapiObject> Workers<M> {
    /// Objects of every group
    pub fn objects(&self) -> Result<Vec<CapiManifest>> {
        let mut objects = Vec::with_capacity(self.groups.len() * 3);
        for group in &self.groups {
            objects.extend(group.objects()?);
        }
        Ok(objects)
    }

    /// Run the rename protocol on each group in order
    ///
    /// Stops at the first failing group. Groups before it keep their renames,
    /// the failing group and those after it are left untouched.
    pub async fn update_immutable_object_names(
        &mut self,
        reader: &dyn ObjectReader,
        cancel: &CancellationToken,
        retriever: &dyn ObjectRetriever<M>,
        comparator: &dyn ObjectComparator<M>,
    ) -> Result<()> {
        for group in &mut self.groups {
            group
                .update_immutable_object_names(reader, cancel, retriever, comparator)
                .await?;
        }
        Ok(())
    }
}

/// Partially assembled worker group
#[derive(Clone, Debug)]
pub struct WorkerGroupBuilder<M> {
    /// The MachineDeployment
    pub machine_deployment: Option<MachineDeployment>,
    /// Its KubeadmConfigTemplate
    pub kubeadm_config_template: Option<KubeadmConfigTemplate>,
    /// Its provider machine template
    pub provider_machine_template: Option<M>,
}

impl<M> Default for WorkerGroupBuilder<M> {
    fn default() -> Self {
        Self {
            machine_deployment: None,
            kubeadm_config_template: None,
            provider_machine_template: None,
        }
    }
}

impl<M: CapiObject> WorkerGroupBuilder<M> {
    /// Finish assembly; every member is required
    pub fn build(self) -> Result<WorkerGroup<M>> {
        let machine_deployment = self
            .machine_deployment
            .ok_or_else(|| Error::validation("worker group is missing its MachineDeployment"))?;
        let group = name_of(&machine_deployment);
        let missing = |kind: String| {
            Error::validation_for_field(
                group.clone(),
                format!("worker group {group} is missing its {kind}"),
            )
        };
        Ok(WorkerGroup {
            kubeadm_config_template: self
                .kubeadm_config_template
                .ok_or_else(|| missing(kind_of::<KubeadmConfigTemplate>()))?,
            provider_machine_template: self
                .provider_machine_template
                .ok_or_else(|| missing(kind_of::<M>()))?,
            machine_deployment,
        })
    }
}

/// Partially assembled workers aggregate
#[derive(Clone, Debug)]
pub struct WorkersBuilder<M> {
    /// One builder per MachineDeployment
    pub groups: Vec<WorkerGroupBuilder<M>>,
}

impl<M> Default for WorkersBuilder<M> {
    fn default() -> Self {
        Self { groups: Vec::new() }
    }
}

impl<M: CapiObject> WorkersBuilder<M> {
    /// Build every group, failing on the first incomplete one
    pub fn build(self) -> Result<Workers<M>> {
        let groups = self
            .groups
            .into_iter()
            .map(WorkerGroupBuilder::build)
            .collect::<Result<Vec<_>>>()?;
        Ok(Workers { groups })
    }
}

/// Register MachineDeployment and KubeadmConfigTemplate
pub fn register_worker_kinds(registry: &mut KindRegistry) -> Result<()> {
    registry.register_all([
        KindMapping::of::<MachineDeployment>(),
        KindMapping::of::<KubeadmConfigTemplate>(),
    ])
}

/// Registry for worker streams of one provider
pub fn workers_parser(machine_template: KindMapping) -> Result<KindRegistry> {
    let mut registry = KindRegistry::new();
    register_worker_kinds(&mut registry)
        .map_err(|e| Error::context("registering base worker kinds", e))?;
    registry
        .register(machine_template)
        .map_err(|e| Error::context("registering provider worker kinds", e))?;
    Ok(registry)
}

/// One group per MachineDeployment, with the templates it references
pub fn process_worker_objects<M: CapiObject>(builder: &mut WorkersBuilder<M>, lookup: &ObjectLookup) {
    for md in lookup.all::<MachineDeployment>() {
        let namespace = namespace_of(&md);
        let machine = &md.spec.template.spec;
        let kubeadm_config_template = machine
            .bootstrap
            .config_ref
            .as_ref()
            .and_then(|reference| lookup.get_from_ref(reference, &namespace));
        let provider_machine_template = lookup.get_from_ref(&machine.infrastructure_ref, &namespace);

        builder.groups.push(WorkerGroupBuilder {
            machine_deployment: Some(md),
            kubeadm_config_template,
            provider_machine_template,
        });
    }
}

/// Assemble the workers aggregate from a lookup
pub fn build_workers<M: CapiObject>(lookup: &ObjectLookup) -> Result<Workers<M>> {
    let mut builder = WorkersBuilder::default();
    process_worker_objects(&mut builder, lookup);
    builder.build()
}

/// Parse a worker manifest stream and assemble it
pub fn parse_workers<M: CapiObject>(
    registry: &KindRegistry,
    input: &str,
    config: &ParserConfig,
) -> Result<Workers<M>> {
    let lookup = registry.parse(input, config)?;
    build_workers(&lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::providers::{DockerMachineTemplate, DockerMachineTemplateSpec};
    use crate::api::{
        Bootstrap, JoinConfiguration, KubeadmConfigTemplateSpec, MachineDeploymentSpec,
        NodeRegistrationOptions, Taint,
    };
    use crate::client::fake::{cluster_failing_on, cluster_with, counting_cluster_with, live};
    use crate::client::MockObjectReader;
    use crate::compare::spec_derivative_eq;
    use kube::Resource;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type DockerWorkers = Workers<DockerMachineTemplate>;

    const NS: &str = "eksa-system";

    fn with_ns<K: CapiObject>(mut object: K) -> K {
        object.meta_mut().namespace = Some(NS.to_string());
        object
    }

    fn template(name: &str, image: &str) -> DockerMachineTemplate {
        let mut mt = with_ns(DockerMachineTemplate::new(name, DockerMachineTemplateSpec::default()));
        mt.spec.template.spec.custom_image = Some(image.to_string());
        mt
    }

    fn config(name: &str, node_labels: &str, taints: Option<Vec<Taint>>) -> KubeadmConfigTemplate {
        let mut kct = with_ns(KubeadmConfigTemplate::new(name, KubeadmConfigTemplateSpec::default()));
        kct.spec.template.spec.join_configuration = Some(JoinConfiguration {
            node_registration: NodeRegistrationOptions {
                kubelet_extra_args: Some(BTreeMap::from([(
                    "node-labels".to_string(),
                    node_labels.to_string(),
                )])),
                taints,
                ..Default::default()
            },
            ..Default::default()
        });
        kct
    }

    fn deployment(pool: &str, config_name: Option<&str>, template_name: &str) -> MachineDeployment {
        let mut md = with_ns(MachineDeployment::new(
            &format!("mgmt-{pool}"),
            MachineDeploymentSpec {
                cluster_name: "mgmt".to_string(),
                replicas: Some(2),
                ..Default::default()
            },
        ));
        md.spec.template.spec.cluster_name = "mgmt".to_string();
        md.spec.template.spec.bootstrap = Bootstrap {
            config_ref: config_name.map(|name| ObjectReference {
                api_version: "bootstrap.cluster.x-k8s.io/v1beta1".to_string(),
                kind: "KubeadmConfigTemplate".to_string(),
                name: name.to_string(),
                namespace: None,
            }),
            ..Default::default()
        };
        md.spec.template.spec.infrastructure_ref = ObjectReference {
            api_version: "infrastructure.cluster.x-k8s.io/v1beta1".to_string(),
            kind: "DockerMachineTemplate".to_string(),
            name: template_name.to_string(),
            namespace: None,
        };
        md
    }

    fn group(pool: &str, image: &str, node_labels: &str) -> WorkerGroup<DockerMachineTemplate> {
        let initial = format!("mgmt-{pool}-1");
        WorkerGroup {
            machine_deployment: deployment(pool, Some(&initial), &initial),
            kubeadm_config_template: config(&initial, node_labels, None),
            provider_machine_template: template(&initial, image),
        }
    }

    fn workers() -> DockerWorkers {
        Workers {
            groups: vec![
                group("md-0", "kindest/node:v1.30.2", "group=md-0"),
                group("md-1", "kindest/node:v1.30.2", "group=md-1"),
            ],
        }
    }

    /// Live objects for a pool whose templates are at generation 2
    fn live_pool(pool: &str, image: &str, node_labels: &str) -> Vec<serde_json::Value> {
        let current = format!("mgmt-{pool}-2");
        vec![
            live(&deployment(pool, Some(&current), &current)),
            live(&config(&current, node_labels, None)),
            live(&template(&current, image)),
        ]
    }

    fn equal(new: &DockerMachineTemplate, old: &DockerMachineTemplate) -> bool {
        spec_derivative_eq(&new.spec, &old.spec)
    }

    async fn update(
        workers: &mut DockerWorkers,
        reader: &dyn ObjectReader,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let retriever = ApiRetriever::<DockerMachineTemplate>::new();
        workers
            .update_immutable_object_names(reader, cancel, &retriever, &equal)
            .await
    }

    fn bootstrap_name(group: &WorkerGroup<DockerMachineTemplate>) -> Option<&str> {
        group
            .machine_deployment
            .spec
            .template
            .spec
            .bootstrap
            .config_ref
            .as_ref()
            .map(|r| r.name.as_str())
    }

    fn infrastructure_name(group: &WorkerGroup<DockerMachineTemplate>) -> &str {
        &group.machine_deployment.spec.template.spec.infrastructure_ref.name
    }

    // =========================================================================
    // Rename protocol
    // =========================================================================

    mod update_immutable_object_names {
        use super::*;

        #[tokio::test]
        async fn new_groups_keep_initial_names() {
            let reader = cluster_with(vec![]);
            let cancel = CancellationToken::new();
            let mut w = workers();

            update(&mut w, &reader, &cancel).await.unwrap();
            assert_eq!(w, workers());
        }

        #[tokio::test]
        async fn unchanged_group_adopts_live_names() {
            let reader = cluster_with(live_pool("md-0", "kindest/node:v1.30.2", "group=md-0"));
            let cancel = CancellationToken::new();
            let mut w = workers();

            update(&mut w, &reader, &cancel).await.unwrap();
            let g = &w.groups[0];
            assert_eq!(name_of(&g.provider_machine_template), "mgmt-md-0-2");
            assert_eq!(name_of(&g.kubeadm_config_template), "mgmt-md-0-2");
            assert_eq!(infrastructure_name(g), "mgmt-md-0-2");
            assert_eq!(bootstrap_name(g), Some("mgmt-md-0-2"));
            // md-1 is not live yet
            assert_eq!(w.groups[1], workers().groups[1]);
        }

        #[tokio::test]
        async fn changed_machine_template_rolls_only_that_template() {
            let reader = cluster_with(live_pool("md-0", "kindest/node:v1.29.0", "group=md-0"));
            let cancel = CancellationToken::new();
            let mut w = workers();

            update(&mut w, &reader, &cancel).await.unwrap();
            let g = &w.groups[0];
            assert_eq!(infrastructure_name(g), "mgmt-md-0-3");
            assert_eq!(name_of(&g.provider_machine_template), "mgmt-md-0-3");
            assert_eq!(bootstrap_name(g), Some("mgmt-md-0-2"));
        }

        #[tokio::test]
        async fn changed_node_labels_roll_only_the_bootstrap_config() {
            let reader = cluster_with(live_pool("md-0", "kindest/node:v1.30.2", "group=old"));
            let cancel = CancellationToken::new();
            let mut w = workers();

            update(&mut w, &reader, &cancel).await.unwrap();
            let g = &w.groups[0];
            assert_eq!(infrastructure_name(g), "mgmt-md-0-2");
            assert_eq!(bootstrap_name(g), Some("mgmt-md-0-3"));
            assert_eq!(name_of(&g.kubeadm_config_template), "mgmt-md-0-3");
        }

        #[tokio::test]
        async fn clearing_taints_rolls_the_bootstrap_config() {
            let mut objects = live_pool("md-0", "kindest/node:v1.30.2", "group=md-0");
            objects[1] = live(&config(
                "mgmt-md-0-2",
                "group=md-0",
                Some(vec![Taint {
                    key: "dedicated".to_string(),
                    effect: "NoSchedule".to_string(),
                    ..Default::default()
                }]),
            ));
            let reader = cluster_with(objects);
            let cancel = CancellationToken::new();

            let mut w = workers();
            if let Some(join) = w.groups[0]
                .kubeadm_config_template
                .spec
                .template
                .spec
                .join_configuration
                .as_mut()
            {
                join.node_registration.taints = Some(vec![]);
            }

            update(&mut w, &reader, &cancel).await.unwrap();
            assert_eq!(bootstrap_name(&w.groups[0]), Some("mgmt-md-0-3"));
        }

        #[tokio::test]
        async fn live_deployment_without_bootstrap_reference_keeps_initial_config_name() {
            let reader = cluster_with(vec![
                live(&deployment("md-0", None, "mgmt-md-0-2")),
                live(&template("mgmt-md-0-2", "kindest/node:v1.30.2")),
            ]);
            let cancel = CancellationToken::new();
            let mut w = workers();

            update(&mut w, &reader, &cancel).await.unwrap();
            let g = &w.groups[0];
            assert_eq!(infrastructure_name(g), "mgmt-md-0-2");
            assert_eq!(bootstrap_name(g), Some("mgmt-md-0-1"));
        }

        #[tokio::test]
        async fn missing_live_bootstrap_config_fails_the_group() {
            let mut objects = live_pool("md-0", "kindest/node:v1.30.2", "group=md-0");
            objects.remove(1);
            let reader = cluster_with(objects);
            let cancel = CancellationToken::new();
            let mut w = workers();

            let err = update(&mut w, &reader, &cancel).await.unwrap_err();
            assert!(err.is_not_found());
            assert!(err
                .to_string()
                .starts_with("reading KubeadmConfigTemplate eksa-system/mgmt-md-0-2 from API"));
            // the machine template rename computed first is discarded with the group
            assert_eq!(w, workers());
        }

        #[tokio::test]
        async fn deployment_read_failure_names_the_deployment() {
            let reader = cluster_failing_on(vec![], "MachineDeployment");
            let cancel = CancellationToken::new();
            let mut w = workers();

            let err = update(&mut w, &reader, &cancel).await.unwrap_err();
            assert!(matches!(
                err,
                Error::Read { ref kind, ref name, .. } if kind == "MachineDeployment" && name == "mgmt-md-0"
            ));
        }

        #[tokio::test]
        async fn failure_keeps_earlier_groups_and_leaves_later_ones_untouched() {
            let mut objects = live_pool("md-0", "kindest/node:v1.29.0", "group=md-0");
            objects.extend(live_pool("md-1", "kindest/node:v1.29.0", "group=md-1"));
            // md-1's live machine template is missing
            objects.pop();
            let reader = cluster_with(objects);
            let cancel = CancellationToken::new();

            let mut w = workers();
            w.groups.push(group("md-2", "kindest/node:v1.30.2", "group=md-2"));
            let before = w.clone();

            let err = update(&mut w, &reader, &cancel).await.unwrap_err();
            assert!(matches!(err, Error::Read { ref kind, .. } if kind == "DockerMachineTemplate"));
            assert_eq!(infrastructure_name(&w.groups[0]), "mgmt-md-0-3");
            assert_eq!(w.groups[1], before.groups[1]);
            assert_eq!(w.groups[2], before.groups[2]);
        }

        #[tokio::test]
        async fn cancellation_stops_all_reads() {
            let (reader, reads) =
                counting_cluster_with(live_pool("md-0", "kindest/node:v1.29.0", "group=md-0"));
            let cancel = CancellationToken::new();
            cancel.cancel();
            let mut w = workers();

            let err = update(&mut w, &reader, &cancel).await.unwrap_err();
            assert!(err.is_cancelled());
            assert_eq!(reads.load(Ordering::SeqCst), 0);
            assert_eq!(w, workers());
        }

        #[tokio::test]
        async fn cancellation_during_a_run_stops_before_the_next_read() {
            let objects = live_pool("md-0", "kindest/node:v1.29.0", "group=md-0");
            let cancel = CancellationToken::new();
            let reads = Arc::new(AtomicUsize::new(0));

            let mut reader = MockObjectReader::new();
            let (token, counter) = (cancel.clone(), reads.clone());
            reader
                .expect_get_object()
                .returning(move |_api_version, kind, name, namespace| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    token.cancel();
                    objects
                        .iter()
                        .find(|o| {
                            o["kind"] == kind
                                && o["metadata"]["name"] == name
                                && o["metadata"]["namespace"] == namespace
                        })
                        .cloned()
                        .ok_or_else(|| Error::not_found(kind, namespace, name))
                });
            let mut w = workers();

            let err = update(&mut w, &reader, &cancel).await.unwrap_err();
            assert!(matches!(err, Error::Cancelled), "unexpected error {err}");
            // only the md-0 MachineDeployment was read
            assert_eq!(reads.load(Ordering::SeqCst), 1);
            assert_eq!(w, workers());
        }

        #[tokio::test]
        async fn runs_are_idempotent() {
            let reader = cluster_with(live_pool("md-0", "kindest/node:v1.29.0", "group=old"));
            let cancel = CancellationToken::new();

            let mut first = workers();
            update(&mut first, &reader, &cancel).await.unwrap();
            let mut second = workers();
            update(&mut second, &reader, &cancel).await.unwrap();
            assert_eq!(first, second);
        }
    }

    // =========================================================================
    // Assembly
    // =========================================================================

    mod assembly {
        use super::*;

        fn lookup_of(workers: &DockerWorkers) -> ObjectLookup {
            let mut lookup = ObjectLookup::new();
            for g in &workers.groups {
                lookup
                    .add(g.machine_deployment.clone())
                    .add(g.kubeadm_config_template.clone())
                    .add(g.provider_machine_template.clone());
            }
            lookup
        }

        #[test]
        fn objects_lists_three_per_group() {
            let objects = workers().objects().unwrap();
            assert_eq!(objects.len(), 6);
            assert_eq!(
                objects.iter().filter(|o| o.kind == "MachineDeployment").count(),
                2
            );
        }

        #[test]
        fn groups_follow_stream_order() {
            let built: DockerWorkers = build_workers(&lookup_of(&workers())).unwrap();
            assert_eq!(built, workers());
        }

        #[test]
        fn empty_lookup_has_no_groups() {
            let built: DockerWorkers = build_workers(&ObjectLookup::new()).unwrap();
            assert!(built.groups.is_empty());
        }

        #[test]
        fn unresolved_template_fails_the_build() {
            let g = group("md-0", "kindest/node:v1.30.2", "group=md-0");
            let mut lookup = ObjectLookup::new();
            lookup
                .add(g.machine_deployment.clone())
                .add(g.kubeadm_config_template.clone());

            let err = build_workers::<DockerMachineTemplate>(&lookup).unwrap_err();
            assert!(matches!(
                err,
                Error::Validation { field: Some(ref f), .. } if f == "mgmt-md-0"
            ));
            assert!(err.to_string().contains("missing its DockerMachineTemplate"));
        }

        #[test]
        fn parser_rejects_a_clashing_provider_kind() {
            let err = workers_parser(KindMapping::named::<DockerMachineTemplate>("MachineDeployment"))
                .unwrap_err();
            assert!(err.to_string().starts_with("registering provider worker kinds"));
        }

        #[test]
        fn parses_a_stream_end_to_end() {
            let registry = workers_parser(KindMapping::of::<DockerMachineTemplate>()).unwrap();
            let stream = crate::manifest::render_documents(&workers().objects().unwrap()).unwrap();
            let parsed: DockerWorkers =
                parse_workers(&registry, &stream, &ParserConfig::strict()).unwrap();
            assert_eq!(parsed, workers());
        }
    }
}
