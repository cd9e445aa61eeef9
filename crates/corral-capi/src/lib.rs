//! Cluster API object graph crate
//!
//! This crate provides:
//! - Typed Cluster API and provider kinds, parsed from manifest streams through
//!   an explicit kind registry
//! - Control plane and worker aggregates assembled from those objects
//! - The rename-on-change protocol that gives changed immutable templates a
//!   new versioned name and rewrites every reference to them
//! - Docker and Snow providers

pub mod api;
pub mod client;
pub mod compare;
pub mod constants;
pub mod controlplane;
pub mod lookup;
pub mod manifest;
pub mod name;
pub mod object;
pub mod provider;
pub mod rename;
pub mod workers;

// Re-export client types
pub use client::{get_typed, KubeObjectReader, ObjectReader};

#[cfg(test)]
pub use client::MockObjectReader;

// Re-export object graph types
pub use controlplane::{ControlPlane, ControlPlaneBuilder};
pub use lookup::{KindMapping, KindRegistry, ObjectLookup, ParserConfig};
pub use manifest::{render_documents, CapiManifest, ManifestMetadata};
pub use object::{CapiObject, ObjectKey};
pub use workers::{WorkerGroup, Workers};

// Re-export rename protocol
pub use rename::{
    ensure_new_name_if_changed, ApiRetriever, ObjectComparator, ObjectRetriever,
};

// Re-export provider types
pub use provider::docker::{Docker, DockerProvider};
pub use provider::snow::Snow;
pub use provider::{ClusterConfig, ClusterObjects, InfrastructureProvider};
