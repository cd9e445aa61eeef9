//! Helpers shared by every typed Cluster API object

use std::fmt;

use corral_common::DEFAULT_NAMESPACE;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A typed, named, namespaced Cluster API object
///
/// Implemented for every kube resource with a static kind. Kept as a single
/// bound so generic code over provider types reads cleanly.
pub trait CapiObject:
    Resource<DynamicType = ()>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> CapiObject for K where
    K: Resource<DynamicType = ()>
        + Clone
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Kind of `K`, e.g. `DockerMachineTemplate`
pub fn kind_of<K: CapiObject>() -> String {
    K::kind(&()).into_owned()
}

/// apiVersion of `K`, e.g. `infrastructure.cluster.x-k8s.io/v1beta1`
pub fn api_version_of<K: CapiObject>() -> String {
    K::api_version(&()).into_owned()
}

/// Name of an object, empty when unset
pub fn name_of<K: CapiObject>(object: &K) -> String {
    object.meta().name.clone().unwrap_or_default()
}

/// Namespace of an object, [`DEFAULT_NAMESPACE`] when unset
pub fn namespace_of<K: CapiObject>(object: &K) -> String {
    object
        .namespace()
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

/// Rename an object in place
pub fn set_name<K: CapiObject>(object: &mut K, name: impl Into<String>) {
    object.meta_mut().name = Some(name.into());
}

/// Identity of an object inside an object stream
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Object kind
    pub kind: String,
    /// Object namespace
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Create a key
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a typed object
    pub fn of<K: CapiObject>(object: &K) -> Self {
        Self::new(kind_of::<K>(), namespace_of(object), name_of(object))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{KubeadmConfigTemplate, KubeadmConfigTemplateSpec};
    use kube::api::ObjectMeta;

    fn template(name: &str, namespace: Option<&str>) -> KubeadmConfigTemplate {
        KubeadmConfigTemplate {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: namespace.map(str::to_string),
                ..Default::default()
            },
            spec: KubeadmConfigTemplateSpec::default(),
        }
    }

    #[test]
    fn static_type_information() {
        assert_eq!(kind_of::<KubeadmConfigTemplate>(), "KubeadmConfigTemplate");
        assert_eq!(
            api_version_of::<KubeadmConfigTemplate>(),
            "bootstrap.cluster.x-k8s.io/v1beta1"
        );
    }

    #[test]
    fn missing_namespace_falls_back_to_default() {
        assert_eq!(namespace_of(&template("md-0-1", None)), "default");
        assert_eq!(namespace_of(&template("md-0-1", Some(""))), "default");
        assert_eq!(namespace_of(&template("md-0-1", Some("eksa-system"))), "eksa-system");
    }

    #[test]
    fn rename_changes_only_the_name() {
        let mut kct = template("md-0-1", Some("eksa-system"));
        set_name(&mut kct, "md-0-2");
        assert_eq!(name_of(&kct), "md-0-2");
        assert_eq!(namespace_of(&kct), "eksa-system");
    }

    #[test]
    fn key_display_is_kind_and_namespaced_name() {
        let key = ObjectKey::of(&template("md-0-1", Some("eksa-system")));
        assert_eq!(key.to_string(), "KubeadmConfigTemplate eksa-system/md-0-1");
    }
}
