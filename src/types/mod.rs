//! Data types for the event lifecycle subsystem
//!
//! This module contains the serde data model shared by the compressor,
//! archiver, version manager and migrator.

mod archive;
mod compression;
mod record;
mod version;

pub use archive::{
    ArchiveFilters, ArchiveInfo, ArchiveMetadata, ArchiveRecord, ArchiveResult, ArchiveStats,
    ArchiveStrategy, ArchiveVerification, CleanupReport, DateRange, RetentionTier,
};
pub use compression::{
    CompressionAlgorithm, CompressionConfig, CompressionEffect, CompressionResult,
    CompressionSummary,
};
pub use record::{EventPayload, EventRecord};
pub use version::{
    CompatibilityResult, CompatibilityType, EventVersion, RiskLevel,
};
