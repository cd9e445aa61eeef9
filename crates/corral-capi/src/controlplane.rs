//! Control plane aggregate
//!
//! Groups the Cluster, the provider cluster, the KubeadmControlPlane with its
//! machine template and, for clusters with external etcd, the EtcdadmCluster
//! with its own machine template. `C` is the provider cluster type and `M`
//! the provider machine template type.

use corral_common::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{Cluster, EtcdadmCluster, KubeadmControlPlane};
use crate::client::ObjectReader;
use crate::lookup::{KindMapping, KindRegistry, ObjectLookup, ParserConfig};
use crate::manifest::CapiManifest;
use crate::object::{kind_of, name_of, namespace_of, set_name, CapiObject};
use crate::rename::{ensure_new_name_if_changed, read_parent, ObjectComparator, ObjectRetriever};

/// Objects making up a cluster's control plane
#[derive(Clone, Debug, PartialEq)]
pub struct ControlPlane<C, M> {
    /// The Cluster API Cluster
    pub cluster: Cluster,
    /// Provider cluster referenced by `cluster.spec.infrastructureRef`
    pub provider_cluster: C,
    /// Control plane referenced by `cluster.spec.controlPlaneRef`
    pub kubeadm_control_plane: KubeadmControlPlane,
    /// Template referenced by the control plane's machine template
    pub control_plane_machine_template: M,
    /// External etcd referenced by `cluster.spec.managedExternalEtcdRef`
    pub etcd_cluster: Option<EtcdadmCluster>,
    /// Template referenced by the etcd cluster
    pub etcd_machine_template: Option<M>,
}

impl<C: CapiObject, M: CapiObject> ControlPlane<C, M> {
    /// Every object as a manifest, external etcd included when present
    pub fn objects(&self) -> Result<Vec<CapiManifest>> {
        let mut objects = vec![
            CapiManifest::from_object(&self.cluster)?,
            CapiManifest::from_object(&self.provider_cluster)?,
            CapiManifest::from_object(&self.kubeadm_control_plane)?,
            CapiManifest::from_object(&self.control_plane_machine_template)?,
        ];
        if let Some(etcd) = &self.etcd_cluster {
            objects.push(CapiManifest::from_object(etcd)?);
        }
        if let Some(template) = &self.etcd_machine_template {
            objects.push(CapiManifest::from_object(template)?);
        }
        Ok(objects)
    }

    /// Give changed machine templates new names and keep unchanged ones
    ///
    /// Reads the live KubeadmControlPlane and EtcdadmCluster to find the
    /// templates currently in use and compares each desired template with
    /// the live one. When the KubeadmControlPlane does not exist yet every
    /// name is left as is. The control plane and etcd templates are versioned
    /// independently.
    ///
    /// On error `self` is left untouched.
    pub async fn update_immutable_object_names(
        &mut self,
        reader: &dyn ObjectReader,
        cancel: &CancellationToken,
        retriever: &dyn ObjectRetriever<M>,
        comparator: &dyn ObjectComparator<M>,
    ) -> Result<()> {
        let mut next = self.clone();
        if !next
            .update_control_plane_template(reader, cancel, retriever, comparator)
            .await?
        {
            return Ok(());
        }
        next.update_etcd_template(reader, cancel, retriever, comparator)
            .await?;
        *self = next;
        Ok(())
    }

    /// Returns `false` when the control plane does not exist yet
    async fn update_control_plane_template(
        &mut self,
        reader: &dyn ObjectReader,
        cancel: &CancellationToken,
        retriever: &dyn ObjectRetriever<M>,
        comparator: &dyn ObjectComparator<M>,
    ) -> Result<bool> {
        let name = name_of(&self.kubeadm_control_plane);
        let namespace = namespace_of(&self.kubeadm_control_plane);
        let Some(live) =
            read_parent::<KubeadmControlPlane>(reader, cancel, &name, &namespace).await?
        else {
            return Ok(false);
        };

        set_name(
            &mut self.control_plane_machine_template,
            live.spec.machine_template.infrastructure_ref.name,
        );
        let template = ensure_new_name_if_changed(
            reader,
            cancel,
            retriever,
            comparator,
            &self.control_plane_machine_template,
        )
        .await?;

        self.kubeadm_control_plane
            .spec
            .machine_template
            .infrastructure_ref
            .name = name_of(&template);
        self.control_plane_machine_template = template;
        Ok(true)
    }

    async fn update_etcd_template(
        &mut self,
        reader: &dyn ObjectReader,
        cancel: &CancellationToken,
        retriever: &dyn ObjectRetriever<M>,
        comparator: &dyn ObjectComparator<M>,
    ) -> Result<()> {
        let (Some(etcd), Some(etcd_template)) =
            (self.etcd_cluster.as_mut(), self.etcd_machine_template.as_mut())
        else {
            return Ok(());
        };

        let name = name_of(&*etcd);
        let namespace = namespace_of(&*etcd);
        let Some(live) = read_parent::<EtcdadmCluster>(reader, cancel, &name, &namespace).await?
        else {
            return Ok(());
        };

        set_name(etcd_template, live.spec.infrastructure_template.name);
        let template =
            ensure_new_name_if_changed(reader, cancel, retriever, comparator, &*etcd_template)
                .await?;

        etcd.spec.infrastructure_template.name = name_of(&template);
        *etcd_template = template;
        Ok(())
    }
}

/// Partially assembled control plane
///
/// The `process_*` functions fill it from an [`ObjectLookup`] by following
/// references from the Cluster downward. A reference that does not resolve
/// leaves its field unset; [`ControlPlaneBuilder::build`] reports what is
/// missing.
#[derive(Clone, Debug)]
pub struct ControlPlaneBuilder<C, M> {
    /// The Cluster
    pub cluster: Option<Cluster>,
    /// Provider cluster
    pub provider_cluster: Option<C>,
    /// KubeadmControlPlane
    pub kubeadm_control_plane: Option<KubeadmControlPlane>,
    /// Control plane machine template
    pub control_plane_machine_template: Option<M>,
    /// EtcdadmCluster
    pub etcd_cluster: Option<EtcdadmCluster>,
    /// Etcd machine template
    pub etcd_machine_template: Option<M>,
}

impl<C, M> Default for ControlPlaneBuilder<C, M> {
    fn default() -> Self {
        Self {
            cluster: None,
            provider_cluster: None,
            kubeadm_control_plane: None,
            control_plane_machine_template: None,
            etcd_cluster: None,
            etcd_machine_template: None,
        }
    }
}

impl<C: CapiObject, M: CapiObject> ControlPlaneBuilder<C, M> {
    /// Finish assembly; every member but external etcd is required
    pub fn build(self) -> Result<ControlPlane<C, M>> {
        Ok(ControlPlane {
            cluster: self.cluster.ok_or_else(missing::<Cluster>)?,
            provider_cluster: self.provider_cluster.ok_or_else(missing::<C>)?,
            kubeadm_control_plane: self
                .kubeadm_control_plane
                .ok_or_else(missing::<KubeadmControlPlane>)?,
            control_plane_machine_template: self
                .control_plane_machine_template
                .ok_or_else(missing::<M>)?,
            etcd_cluster: self.etcd_cluster,
            etcd_machine_template: self.etcd_machine_template,
        })
    }
}

fn missing<K: CapiObject>() -> Error {
    Error::validation(format!("control plane is missing its {}", kind_of::<K>()))
}

/// Register Cluster, KubeadmControlPlane and EtcdadmCluster
pub fn register_control_plane_kinds(registry: &mut KindRegistry) -> Result<()> {
    registry.register_all([
        KindMapping::of::<Cluster>(),
        KindMapping::of::<KubeadmControlPlane>(),
        KindMapping::of::<EtcdadmCluster>(),
    ])
}

/// Registry for control plane streams of one provider
pub fn control_plane_parser(
    provider_cluster: KindMapping,
    machine_template: KindMapping,
) -> Result<KindRegistry> {
    let mut registry = KindRegistry::new();
    register_control_plane_kinds(&mut registry)
        .map_err(|e| Error::context("registering base control plane kinds", e))?;
    registry
        .register_all([provider_cluster, machine_template])
        .map_err(|e| Error::context("registering provider control plane kinds", e))?;
    Ok(registry)
}

/// Take the first Cluster in the lookup
pub fn process_cluster<C, M>(builder: &mut ControlPlaneBuilder<C, M>, lookup: &ObjectLookup) {
    let mut clusters = lookup.all::<Cluster>().into_iter();
    builder.cluster = clusters.next();
    if let Some(extra) = clusters.next() {
        warn!(ignored = %name_of(&extra), "object stream holds more than one Cluster, using the first");
    }
}

/// Resolve the Cluster's infrastructure reference
pub fn process_provider_cluster<C: CapiObject, M>(
    builder: &mut ControlPlaneBuilder<C, M>,
    lookup: &ObjectLookup,
) {
    let Some(cluster) = &builder.cluster else {
        return;
    };
    let namespace = namespace_of(cluster);
    builder.provider_cluster = cluster
        .spec
        .infrastructure_ref
        .as_ref()
        .and_then(|reference| lookup.get_from_ref(reference, &namespace));
}

/// Resolve the Cluster's control plane reference and its machine template
pub fn process_kubeadm_control_plane<C, M: CapiObject>(
    builder: &mut ControlPlaneBuilder<C, M>,
    lookup: &ObjectLookup,
) {
    let Some(cluster) = &builder.cluster else {
        return;
    };
    let namespace = namespace_of(cluster);
    let Some(kcp) = cluster
        .spec
        .control_plane_ref
        .as_ref()
        .and_then(|reference| lookup.get_from_ref::<KubeadmControlPlane>(reference, &namespace))
    else {
        debug!(cluster = %name_of(cluster), "control plane reference does not resolve");
        return;
    };

    builder.control_plane_machine_template =
        lookup.get_from_ref(&kcp.spec.machine_template.infrastructure_ref, &namespace_of(&kcp));
    builder.kubeadm_control_plane = Some(kcp);
}

/// Resolve the Cluster's external etcd reference and its machine template
pub fn process_etcd_cluster<C, M: CapiObject>(
    builder: &mut ControlPlaneBuilder<C, M>,
    lookup: &ObjectLookup,
) {
    let Some(cluster) = &builder.cluster else {
        return;
    };
    let namespace = namespace_of(cluster);
    let Some(etcd) = cluster
        .spec
        .managed_external_etcd_ref
        .as_ref()
        .and_then(|reference| lookup.get_from_ref::<EtcdadmCluster>(reference, &namespace))
    else {
        return;
    };

    builder.etcd_machine_template =
        lookup.get_from_ref(&etcd.spec.infrastructure_template, &namespace_of(&etcd));
    builder.etcd_cluster = Some(etcd);
}

/// Fill every control plane member reachable from the Cluster
pub fn process_control_plane_objects<C: CapiObject, M: CapiObject>(
    builder: &mut ControlPlaneBuilder<C, M>,
    lookup: &ObjectLookup,
) {
    process_cluster(builder, lookup);
    if builder.cluster.is_none() {
        return;
    }
    process_provider_cluster(builder, lookup);
    process_kubeadm_control_plane(builder, lookup);
    process_etcd_cluster(builder, lookup);
}

/// Assemble a control plane from a lookup
pub fn build_control_plane<C: CapiObject, M: CapiObject>(
    lookup: &ObjectLookup,
) -> Result<ControlPlane<C, M>> {
    let mut builder = ControlPlaneBuilder::default();
    process_control_plane_objects(&mut builder, lookup);
    builder.build()
}

/// Parse a control plane manifest stream and assemble it
pub fn parse_control_plane<C: CapiObject, M: CapiObject>(
    registry: &KindRegistry,
    input: &str,
    config: &ParserConfig,
) -> Result<ControlPlane<C, M>> {
    let lookup = registry.parse(input, config)?;
    build_control_plane(&lookup)
}
