//! Common building blocks for corral: errors, YAML parsing, Kubernetes client
//! helpers and telemetry.

#![deny(missing_docs)]

pub mod error;
pub mod kube_utils;
pub mod telemetry;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace used for objects that do not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Value of the `app.kubernetes.io/managed-by` label on generated objects
pub const MANAGED_BY: &str = "corral";
