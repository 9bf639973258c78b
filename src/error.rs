//! Error types for the reconciliation engine and its collaborators.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the metadata and ignored-entity stores
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Inconsistent object structure: {0}")]
    InconsistentStructure(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Path {path:?} exceeds the maximum path length of {limit}")]
    PathTooLong { path: PathBuf, limit: usize },

    #[error("Local filesystem error at {path:?}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote repository error: {0}")]
    RemoteError(String),

    #[error("Handler {handler} failed: {message}")]
    HandlerFailed { handler: String, message: String },

    #[error("Event queue is stopped")]
    QueueStopped,

    #[error("Event queue consumer failed to start: {0}")]
    QueueStart(#[source] std::io::Error),
}

impl SyncError {
    /// Wrap an io error with the path that produced it
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::LocalIo {
            path: path.into(),
            source,
        }
    }
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::ConfigError(err.to_string())
    }
}
