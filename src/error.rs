//! Error types for the event lifecycle subsystem
//!
//! Every fallible operation returns [`LifecycleResult`]. Batch operations
//! (compression batches, batch migration, restore, retention cleanup) do not
//! fail as a whole for a single bad item; they record the item's
//! [`ErrorKind`] and message instead.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::CompressionAlgorithm;

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors raised by the compressor, archiver, version manager and migrator
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Compression did not finish within the configured deadline.
    #[error("{algorithm} compression exceeded timeout of {timeout_ms} ms")]
    CompressionTimeout {
        algorithm: CompressionAlgorithm,
        timeout_ms: u64,
    },

    #[error("{algorithm} compression failed: {cause}")]
    Compression {
        algorithm: CompressionAlgorithm,
        cause: String,
    },

    /// The byte stream does not match the claimed algorithm's framing.
    #[error("{algorithm} decompression failed: {cause}")]
    Decompression {
        algorithm: CompressionAlgorithm,
        cause: String,
    },

    #[error("archive condition not met: {event_count} events, {size_mb:.3} MB")]
    ArchiveConditionNotMet { event_count: usize, size_mb: f64 },

    #[error("archive I/O error at {path}: {source}")]
    ArchiveIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive not found: {0}")]
    ArchiveNotFound(Uuid),

    #[error("corrupt archive {path}: {cause}")]
    CorruptArchive { path: PathBuf, cause: String },

    /// No candidate field yielded an event type.
    #[error("could not extract event type from payload of kind '{kind}'")]
    EventTypeExtraction { kind: String },

    #[error("migration script {event_type} {from_version} -> {to_version} failed: {cause}")]
    MigrationScript {
        event_type: String,
        from_version: String,
        to_version: String,
        cause: String,
    },

    #[error("version {version} of {event_type} is not registered")]
    VersionNotFound { event_type: String, version: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl LifecycleError {
    /// Wrap an I/O error with the path it happened on.
    pub fn archive_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LifecycleError::ArchiveIo {
            path: path.into(),
            source,
        }
    }

    /// Stable classification tag
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::CompressionTimeout { .. } => ErrorKind::CompressionTimeout,
            LifecycleError::Compression { .. } => ErrorKind::Compression,
            LifecycleError::Decompression { .. } => ErrorKind::Decompression,
            LifecycleError::ArchiveConditionNotMet { .. } => ErrorKind::ArchiveConditionNotMet,
            LifecycleError::ArchiveIo { .. } | LifecycleError::Io(_) => ErrorKind::ArchiveIo,
            LifecycleError::ArchiveNotFound(_) => ErrorKind::ArchiveNotFound,
            LifecycleError::CorruptArchive { .. } => ErrorKind::CorruptArchive,
            LifecycleError::EventTypeExtraction { .. } => ErrorKind::EventTypeExtraction,
            LifecycleError::MigrationScript { .. } => ErrorKind::MigrationScript,
            LifecycleError::VersionNotFound { .. } => ErrorKind::VersionNotFound,
            LifecycleError::Validation(_) => ErrorKind::Validation,
            LifecycleError::Serialization(_) => ErrorKind::Serialization,
            LifecycleError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}

/// Serializable error classification used in per-item failure records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    CompressionTimeout,
    Compression,
    Decompression,
    ArchiveConditionNotMet,
    ArchiveIo,
    ArchiveNotFound,
    CorruptArchive,
    EventTypeExtraction,
    MigrationScript,
    VersionNotFound,
    Validation,
    Serialization,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let err = LifecycleError::CompressionTimeout {
            algorithm: CompressionAlgorithm::Gzip,
            timeout_ms: 5,
        };
        assert_eq!(err.kind(), ErrorKind::CompressionTimeout);
        assert!(err.to_string().contains("gzip"));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = LifecycleError::archive_io("/tmp/x", io);
        assert_eq!(err.kind(), ErrorKind::ArchiveIo);
        assert!(err.to_string().contains("/tmp/x"));
    }

    #[test]
    fn test_error_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::EventTypeExtraction).unwrap();
        assert_eq!(json, "\"EVENT_TYPE_EXTRACTION\"");
    }
}
