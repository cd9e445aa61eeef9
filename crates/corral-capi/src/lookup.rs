//! Kind registry, object stream parsing and reference lookup
//!
//! A [`KindRegistry`] maps kind strings to typed decoders. Parsing a manifest
//! stream with it yields an [`ObjectLookup`], a table of decoded objects keyed
//! by `(kind, namespace, name)` that aggregate assembly walks by following
//! references from the Cluster downward.
//!
//! Registries are plain values built per run; there is no process-wide scheme.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use corral_common::{yaml, Error, Result, DEFAULT_NAMESPACE};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::ObjectReference;
use crate::object::{kind_of, CapiObject, ObjectKey};

type DecodedObject = Box<dyn Any + Send + Sync>;
type Decoder = Arc<dyn Fn(Value) -> Result<DecodedObject> + Send + Sync>;

/// Parser behavior
#[derive(Clone, Debug)]
pub struct ParserConfig {
    /// Fail on documents whose kind is not registered instead of skipping them
    pub strict: bool,
    /// Namespace given to documents that do not set one
    pub default_namespace: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strict: false,
            default_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl ParserConfig {
    /// Reject unknown kinds
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    /// Use `namespace` for documents without one
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }
}

/// Association of a kind string with a typed decoder
#[derive(Clone)]
pub struct KindMapping {
    kind: String,
    decode: Decoder,
}

impl KindMapping {
    /// Map `K`'s own kind to `K`
    pub fn of<K: CapiObject>() -> Self {
        Self::named::<K>(kind_of::<K>())
    }

    /// Map an arbitrary kind string to `K`
    pub fn named<K: CapiObject>(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        let error_kind = kind.clone();
        Self {
            kind,
            decode: Arc::new(move |value| {
                serde_json::from_value::<K>(value)
                    .map(|object| Box::new(object) as DecodedObject)
                    .map_err(|e| Error::serialization_for_kind(&error_kind, e.to_string()))
            }),
        }
    }

    /// The mapped kind
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl fmt::Debug for KindMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindMapping").field("kind", &self.kind).finish()
    }
}

/// Explicit set of kinds a parser understands
#[derive(Clone, Debug, Default)]
pub struct KindRegistry {
    mappings: BTreeMap<String, KindMapping>,
}

impl KindRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapping; each kind may only be registered once
    pub fn register(&mut self, mapping: KindMapping) -> Result<()> {
        if self.mappings.contains_key(&mapping.kind) {
            return Err(Error::registry(&mapping.kind, "kind is already registered"));
        }
        self.mappings.insert(mapping.kind.clone(), mapping);
        Ok(())
    }

    /// Register several mappings, stopping at the first conflict
    pub fn register_all(&mut self, mappings: impl IntoIterator<Item = KindMapping>) -> Result<()> {
        mappings.into_iter().try_for_each(|m| self.register(m))
    }

    /// Whether `kind` is registered
    pub fn contains(&self, kind: &str) -> bool {
        self.mappings.contains_key(kind)
    }

    /// Registered kinds in sorted order
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.mappings.keys().map(String::as_str)
    }

    /// Parse a multi-document manifest stream into a lookup table
    pub fn parse(&self, input: &str, config: &ParserConfig) -> Result<ObjectLookup> {
        let mut lookup = ObjectLookup::default();

        for (index, mut doc) in yaml::parse_documents(input)?.into_iter().enumerate() {
            let kind = doc
                .get("kind")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::serialization(format!("document {index} has no kind"))
                })?;

            let Some(mapping) = self.mappings.get(&kind) else {
                if config.strict {
                    return Err(Error::registry(&kind, "kind is not registered"));
                }
                debug!(kind = %kind, document = index, "skipping unregistered kind");
                continue;
            };

            let (namespace, name) = normalize_metadata(&mut doc, &kind, &config.default_namespace)?;
            let object = (mapping.decode)(doc)?;
            lookup.insert(ObjectKey::new(kind, namespace, name), object);
        }

        Ok(lookup)
    }
}

/// Fill in a missing namespace and `spec`, returning `(namespace, name)`
fn normalize_metadata(doc: &mut Value, kind: &str, default_namespace: &str) -> Result<(String, String)> {
    let Some(object) = doc.as_object_mut() else {
        return Err(Error::serialization_for_kind(kind, "document is not a mapping"));
    };
    object
        .entry("spec")
        .or_insert_with(|| Value::Object(Default::default()));

    let metadata = object
        .get_mut("metadata")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| Error::validation_for_field("metadata", format!("{kind} has no metadata")))?;

    let name = metadata
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::validation_for_field("metadata.name", format!("{kind} has no name")))?;

    let namespace = match metadata.get("namespace").and_then(Value::as_str) {
        Some(ns) if !ns.is_empty() => ns.to_string(),
        _ => {
            metadata.insert(
                "namespace".to_string(),
                Value::String(default_namespace.to_string()),
            );
            default_namespace.to_string()
        }
    };

    Ok((namespace, name))
}

/// Decoded objects keyed by `(kind, namespace, name)`
#[derive(Default)]
pub struct ObjectLookup {
    objects: BTreeMap<ObjectKey, DecodedObject>,
    order: Vec<ObjectKey>,
}

impl ObjectLookup {
    /// An empty lookup
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a typed object under its own kind
    pub fn add<K: CapiObject>(&mut self, object: K) -> &mut Self {
        self.insert(ObjectKey::of(&object), Box::new(object));
        self
    }

    fn insert(&mut self, key: ObjectKey, object: DecodedObject) {
        if self.objects.insert(key.clone(), object).is_some() {
            warn!(object = %key, "duplicate object in stream, keeping the later one");
        } else {
            self.order.push(key);
        }
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the lookup holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Keys in stream order
    pub fn keys(&self) -> impl Iterator<Item = &ObjectKey> {
        self.order.iter()
    }

    /// Object of kind `K` by namespace and name
    pub fn get<K: CapiObject>(&self, namespace: &str, name: &str) -> Option<K> {
        self.get_kind(&kind_of::<K>(), namespace, name)
    }

    /// Object registered under `kind`, decoded as `K`
    ///
    /// `None` when absent or when the stored object is not a `K`.
    pub fn get_kind<K: CapiObject>(&self, kind: &str, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .get(&ObjectKey::new(kind, namespace, name))
            .and_then(|object| object.downcast_ref::<K>())
            .cloned()
    }

    /// Dereference `reference`, resolving an empty namespace to `referrer_namespace`
    pub fn get_from_ref<K: CapiObject>(
        &self,
        reference: &ObjectReference,
        referrer_namespace: &str,
    ) -> Option<K> {
        self.get_kind(
            &reference.kind,
            reference.namespace_or(referrer_namespace),
            &reference.name,
        )
    }

    /// Every object registered under `K`'s kind, in stream order
    pub fn all<K: CapiObject>(&self) -> Vec<K> {
        let kind = kind_of::<K>();
        self.order
            .iter()
            .filter(|key| key.kind == kind)
            .filter_map(|key| self.objects.get(key))
            .filter_map(|object| object.downcast_ref::<K>())
            .cloned()
            .collect()
    }
}

impl fmt::Debug for ObjectLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.order.iter().map(ToString::to_string)).finish()
    }
}
