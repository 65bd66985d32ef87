//! Error types for the market-trends system.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the market-trends system.
///
/// Only run-level failures surface here. Per-snapshot and per-item anomalies
/// are absorbed where they occur and never abort a batch.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// Snapshot directory could not be listed.
    #[error("Cannot read snapshot directory {path}: {source}")]
    SnapshotDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single snapshot document could not be loaded.
    #[error("Snapshot {path}: {message}")]
    Snapshot { path: PathBuf, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a snapshot error for the given file.
    pub fn snapshot(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Error::Snapshot {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a snapshot-directory error.
    pub fn snapshot_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::SnapshotDir {
            path: path.into(),
            source,
        }
    }
}
