//! Read access to live Cluster API objects
//!
//! The rename protocol only ever reads. [`ObjectReader`] is the seam between
//! it and the API server: [`KubeObjectReader`] talks to a real cluster, tests
//! use the mockall-generated `MockObjectReader`.

use async_trait::async_trait;
use kube::api::{Api, DynamicObject};
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use corral_common::kube_utils::build_api_resource;
use corral_common::Error;

use crate::object::{api_version_of, kind_of, CapiObject};

/// Reads single objects from the API server
///
/// Implementations return [`Error::NotFound`] when the object does not exist
/// so callers can tell absence apart from failure.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectReader: Send + Sync {
    /// Fetch one object as JSON
    async fn get_object(
        &self,
        api_version: &str,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<serde_json::Value, Error>;
}

/// [`ObjectReader`] backed by a kube client
#[derive(Clone)]
pub struct KubeObjectReader {
    client: Client,
}

impl KubeObjectReader {
    /// Create a reader using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectReader for KubeObjectReader {
    async fn get_object(
        &self,
        api_version: &str,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<serde_json::Value, Error> {
        let ar = build_api_resource(api_version, kind);
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);

        match api.get(name).await {
            Ok(object) => {
                debug!(kind = %kind, namespace = %namespace, name = %name, "read live object");
                serde_json::to_value(&object)
                    .map_err(|e| Error::serialization_for_kind(kind, e.to_string()))
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                Err(Error::not_found(kind, namespace, name))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Read one typed object, honoring cancellation
///
/// Returns [`Error::Cancelled`] without issuing a read when `cancel` has
/// already fired, and abandons an in-flight read when it fires mid-request.
pub async fn get_typed<K: CapiObject>(
    reader: &dyn ObjectReader,
    cancel: &CancellationToken,
    name: &str,
    namespace: &str,
) -> Result<K, Error> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let api_version = api_version_of::<K>();
    let kind = kind_of::<K>();

    let value = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        result = reader.get_object(&api_version, &kind, name, namespace) => result?,
    };

    serde_json::from_value(value).map_err(|e| Error::serialization_for_kind(kind, e.to_string()))
}

/// In-memory stand-in for a cluster, built on `MockObjectReader`
#[cfg(test)]
pub(crate) mod fake {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde::Serialize;
    use serde_json::Value;

    use super::*;

    /// Serialize a typed object the way the API server would return it
    pub(crate) fn live<K: Serialize>(object: &K) -> Value {
        serde_json::to_value(object).expect("object serializes")
    }

    fn serve(objects: &[Value], kind: &str, name: &str, namespace: &str) -> Result<Value, Error> {
        objects
            .iter()
            .find(|o| {
                o["kind"] == kind
                    && o["metadata"]["name"] == name
                    && o["metadata"]["namespace"] == namespace
            })
            .cloned()
            .ok_or_else(|| Error::not_found(kind, namespace, name))
    }

    /// Reader that serves `objects` and answers not-found for everything else
    pub(crate) fn cluster_with(objects: Vec<Value>) -> MockObjectReader {
        counting_cluster_with(objects).0
    }

    /// Like [`cluster_with`], also counting every read issued
    pub(crate) fn counting_cluster_with(objects: Vec<Value>) -> (MockObjectReader, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = reads.clone();
        let mut reader = MockObjectReader::new();
        reader
            .expect_get_object()
            .returning(move |_api_version, kind, name, namespace| {
                counter.fetch_add(1, Ordering::SeqCst);
                serve(&objects, kind, name, namespace)
            });
        (reader, reads)
    }

    /// Reader serving `objects`, except that reads of `failing_kind` fail
    pub(crate) fn cluster_failing_on(objects: Vec<Value>, failing_kind: &'static str) -> MockObjectReader {
        let mut reader = MockObjectReader::new();
        reader
            .expect_get_object()
            .returning(move |_api_version, kind, name, namespace| {
                if kind == failing_kind {
                    return Err(Error::internal("connection refused"));
                }
                serve(&objects, kind, name, namespace)
            });
        reader
    }
}

#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;
    use crate::api::{MachineDeployment, MachineDeploymentSpec};
    use kube::api::ObjectMeta;
    use std::sync::atomic::Ordering;

    fn machine_deployment() -> MachineDeployment {
        MachineDeployment {
            metadata: ObjectMeta {
                name: Some("mgmt-md-0".to_string()),
                namespace: Some("eksa-system".to_string()),
                ..Default::default()
            },
            spec: MachineDeploymentSpec {
                cluster_name: "mgmt".to_string(),
                replicas: Some(2),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn typed_read_decodes_the_object() {
        let reader = cluster_with(vec![live(&machine_deployment())]);
        let cancel = CancellationToken::new();

        let md: MachineDeployment = get_typed(&reader, &cancel, "mgmt-md-0", "eksa-system")
            .await
            .unwrap();
        assert_eq!(md.spec.replicas, Some(2));
    }

    #[tokio::test]
    async fn absent_object_is_not_found() {
        let reader = cluster_with(vec![]);
        let cancel = CancellationToken::new();

        let err = get_typed::<MachineDeployment>(&reader, &cancel, "mgmt-md-0", "eksa-system")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn reader_receives_static_type_information() {
        let mut reader = MockObjectReader::new();
        reader
            .expect_get_object()
            .times(1)
            .returning(|api_version, kind, name, namespace| {
                assert_eq!(api_version, "cluster.x-k8s.io/v1beta1");
                assert_eq!(kind, "MachineDeployment");
                assert_eq!((namespace, name), ("eksa-system", "mgmt-md-0"));
                Ok(live(&machine_deployment()))
            });

        let cancel = CancellationToken::new();
        get_typed::<MachineDeployment>(&reader, &cancel, "mgmt-md-0", "eksa-system")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_token_issues_no_read() {
        let (reader, reads) = counting_cluster_with(vec![live(&machine_deployment())]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = get_typed::<MachineDeployment>(&reader, &cancel, "mgmt-md-0", "eksa-system")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undecodable_object_is_a_serialization_error() {
        let mut reader = MockObjectReader::new();
        reader
            .expect_get_object()
            .returning(|_, _, _, _| Ok(serde_json::json!({"metadata": {"name": 7}, "spec": {}})));

        let cancel = CancellationToken::new();
        let err = get_typed::<MachineDeployment>(&reader, &cancel, "mgmt-md-0", "eksa-system")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Serialization { kind: Some(ref k), .. } if k == "MachineDeployment"));
    }
}
