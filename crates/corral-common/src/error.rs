//! Error types for corral
//!
//! Errors carry the kind, namespace and name of the object being worked on so a
//! failed generation run can be traced back to the manifest that caused it.
//! Wrapping variants keep the underlying error as a `source` so callers can walk
//! the chain and classify it (see [`Error::is_not_found`]).

use thiserror::Error;

/// Main error type for corral operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The requested object does not exist on the API server
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Namespace that was searched
        namespace: String,
        /// Name that was searched for
        name: String,
    },

    /// Reading a live object failed for a reason other than cancellation
    #[error("reading {kind} {namespace}/{name} from API: {source}")]
    Read {
        /// Kind of the object being read
        kind: String,
        /// Namespace of the object being read
        namespace: String,
        /// Name of the object being read
        name: String,
        /// What went wrong
        #[source]
        source: Box<Error>,
    },

    /// A name does not follow the `<base>-<N>` versioned format
    #[error("invalid format of name [{name}]")]
    NameFormat {
        /// The offending name
        name: String,
    },

    /// Computing the next versioned name for an immutable object failed
    #[error("incrementing name for {kind} {namespace}/{name}: {source}")]
    Rename {
        /// Kind of the object being renamed
        kind: String,
        /// Namespace of the object being renamed
        namespace: String,
        /// Name the increment was attempted on
        name: String,
        /// What went wrong
        #[source]
        source: Box<Error>,
    },

    /// Kind registration or kind dispatch error
    #[error("kind registry error for {kind}: {message}")]
    Registry {
        /// Kind the registry operation was about
        kind: String,
        /// Description of what failed
        message: String,
    },

    /// Validation error for cluster descriptions and object graphs
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "workerNodeGroups[0].name")
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// An error annotated with the operation that produced it
    #[error("{context}: {source}")]
    Context {
        /// The operation that failed
        context: String,
        /// What went wrong
        #[source]
        source: Box<Error>,
    },

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "create_client")
        context: String,
    },
}

impl Error {
    /// Create a not-found error for an object
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Wrap an error raised while reading an object from the API server
    ///
    /// Cancellation passes through unwrapped so callers can always match on it.
    pub fn read(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        source: Error,
    ) -> Self {
        if matches!(source, Error::Cancelled) {
            return source;
        }
        Self::Read {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Create a name format error
    pub fn name_format(name: impl Into<String>) -> Self {
        Self::NameFormat { name: name.into() }
    }

    /// Wrap an error raised while computing the next name of an object
    pub fn rename(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        source: Error,
    ) -> Self {
        Self::Rename {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Create a registry error for a kind
    pub fn registry(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Registry {
            kind: kind.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with a field path
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific resource kind
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Annotate an error with the operation that produced it
    ///
    /// Cancellation passes through unwrapped.
    pub fn context(context: impl Into<String>, source: Error) -> Self {
        if matches!(source, Error::Cancelled) {
            return source;
        }
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: "unknown".to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check whether this error (or the error it wraps) means an object is absent
    ///
    /// Both [`Error::NotFound`] and raw 404 responses from the API server count.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            Error::Read { source, .. }
            | Error::Rename { source, .. }
            | Error::Context { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Check whether this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Read { source, .. }
            | Error::Rename { source, .. }
            | Error::Context { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if this error is retryable
    ///
    /// Malformed names, unknown kinds and invalid manifests need a config fix.
    /// Transient API failures may succeed on a later run.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // 4xx responses will not change on retry
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Read { source, .. } | Error::Context { source, .. } => source.is_retryable(),
            Error::NotFound { .. } => false,
            Error::NameFormat { .. } => false,
            Error::Rename { .. } => false,
            Error::Registry { .. } => false,
            Error::Validation { .. } => false,
            Error::Serialization { .. } => false,
            Error::Cancelled => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the kind of the object this error is about, if any
    pub fn kind(&self) -> Option<&str> {
        match self {
            Error::NotFound { kind, .. }
            | Error::Read { kind, .. }
            | Error::Rename { kind, .. }
            | Error::Registry { kind, .. } => Some(kind),
            Error::Serialization { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }
}
