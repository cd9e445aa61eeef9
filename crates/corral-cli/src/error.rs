//! Error types for the CLI

use std::path::PathBuf;

use corral_common::telemetry::TelemetryError;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Corral(#[from] corral_common::Error),

    #[error("reading {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

impl Error {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Whether the run stopped because it was interrupted
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Corral(e) if e.is_cancelled())
    }

    /// Whether running the same command again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Corral(e) => e.is_retryable(),
            Error::ReadFile { .. } | Error::Telemetry(_) => false,
            Error::Io(_) => true,
        }
    }
}
