//! Rename-on-change for immutable objects
//!
//! Machine templates and bootstrap config templates are immutable once
//! created. When the desired spec of one differs from the live object it
//! replaces, the desired object gets the next versioned name and every
//! reference to it is rewritten, so machines roll over to the new template.
//! When nothing changed the live name is kept and nothing rolls.

use std::marker::PhantomData;

use async_trait::async_trait;
use corral_common::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{get_typed, ObjectReader};
use crate::name::increment_name;
use crate::object::{kind_of, name_of, namespace_of, set_name, CapiObject};

/// Fetches the live version of an object
#[async_trait]
pub trait ObjectRetriever<M>: Send + Sync {
    /// Read the live object named `name` in `namespace`
    async fn retrieve(
        &self,
        reader: &dyn ObjectReader,
        cancel: &CancellationToken,
        name: &str,
        namespace: &str,
    ) -> Result<M>;
}

/// Decides whether a desired object is satisfied by the live one
///
/// Implemented for any `Fn(&M, &M) -> bool`, so plain functions such as
/// [`crate::compare::kubeadm_config_template_equal`] can be passed directly.
pub trait ObjectComparator<M>: Send + Sync {
    /// `true` when `new` can keep `old`'s name
    fn unchanged(&self, new: &M, old: &M) -> bool;
}

impl<M, F> ObjectComparator<M> for F
where
    F: Fn(&M, &M) -> bool + Send + Sync,
{
    fn unchanged(&self, new: &M, old: &M) -> bool {
        self(new, old)
    }
}

/// Retriever reading `M` through the [`ObjectReader`] by its static kind
pub struct ApiRetriever<M> {
    _object: PhantomData<fn() -> M>,
}

impl<M> ApiRetriever<M> {
    /// Create a retriever
    pub fn new() -> Self {
        Self {
            _object: PhantomData,
        }
    }
}

impl<M> Default for ApiRetriever<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for ApiRetriever<M> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<M> std::fmt::Debug for ApiRetriever<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRetriever").finish()
    }
}

#[async_trait]
impl<M: CapiObject> ObjectRetriever<M> for ApiRetriever<M> {
    async fn retrieve(
        &self,
        reader: &dyn ObjectReader,
        cancel: &CancellationToken,
        name: &str,
        namespace: &str,
    ) -> Result<M> {
        get_typed::<M>(reader, cancel, name, namespace).await
    }
}

/// Read the parent of a set of immutable objects
///
/// `Ok(None)` means the parent has not been created yet, so its children keep
/// their initial names.
pub async fn read_parent<K: CapiObject>(
    reader: &dyn ObjectReader,
    cancel: &CancellationToken,
    name: &str,
    namespace: &str,
) -> Result<Option<K>> {
    match get_typed::<K>(reader, cancel, name, namespace).await {
        Ok(parent) => Ok(Some(parent)),
        Err(e) if e.is_not_found() => {
            debug!(kind = %kind_of::<K>(), namespace = %namespace, name = %name, "parent not found, keeping initial names");
            Ok(None)
        }
        Err(e) => Err(Error::read(kind_of::<K>(), namespace, name, e)),
    }
}

/// Return `desired` under its current name if it matches the live object of
/// that name, or under the next versioned name if it does not
///
/// `desired` must already carry the name of the live object it replaces.
/// The live object must exist: a missing object is an error here because the
/// caller only gets this far when the parent referencing it exists.
pub async fn ensure_new_name_if_changed<M: CapiObject>(
    reader: &dyn ObjectReader,
    cancel: &CancellationToken,
    retriever: &dyn ObjectRetriever<M>,
    comparator: &dyn ObjectComparator<M>,
    desired: &M,
) -> Result<M> {
    let kind = kind_of::<M>();
    let name = name_of(desired);
    let namespace = namespace_of(desired);

    let live = retriever
        .retrieve(reader, cancel, &name, &namespace)
        .await
        .map_err(|e| Error::read(&kind, &namespace, &name, e))?;

    if comparator.unchanged(desired, &live) {
        debug!(kind = %kind, namespace = %namespace, name = %name, "immutable object unchanged, keeping name");
        return Ok(desired.clone());
    }

    let next = increment_name(&name).map_err(|e| Error::rename(&kind, &namespace, &name, e))?;
    info!(
        kind = %kind,
        namespace = %namespace,
        from = %name,
        to = %next,
        "immutable object changed, rolling to new name"
    );

    let mut renamed = desired.clone();
    set_name(&mut renamed, next);
    Ok(renamed)
}
