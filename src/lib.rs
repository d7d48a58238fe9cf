//! Event Lifecycle
//!
//! Compression, archival and schema-version migration for event-sourced
//! stores.
//!
//! # Features
//!
//! - **Compression**: gzip, brotli, lz4 and zstd framing with size windows,
//!   timeouts and parallel batches
//! - **Archiving**: cold event batches written to compressed blobs with a
//!   durable index, restore, retention cleanup and integrity checks
//! - **Versioning**: semantic versions per event type with a compatibility
//!   decision table
//! - **Migration**: payload transforms between versions, chained across
//!   intermediate versions, with validation rules
//!
//! # Modules
//!
//! - `types`: serde data model shared by every component
//! - `compression`: the `Compressor`
//! - `archive`: the `Archiver`, its config, blob format and index
//! - `versioning`: `VersionManager` and semver parsing
//! - `migration`: `VersionMigrator`, scripts and validation rules
//! - `event_store`: event sources and the archive job
//! - `service`: tokio facade and retention sweeper
//! - `config`, `logging`, `error`, `utils`: ambient plumbing
//!
//! # Example
//!
//! ```no_run
//! use event_lifecycle::{ArchiveConfig, ArchiveOverrides, Archiver, EventRecord};
//! use serde_json::json;
//!
//! fn main() -> event_lifecycle::LifecycleResult<()> {
//!     let archiver = Archiver::new(ArchiveConfig::new("data/archive"))?;
//!     let events = vec![EventRecord::new("e1", "order-1", "OrderPlaced", json!({"total": 42}))];
//!     let result = archiver.archive_events(&events, &ArchiveOverrides::default());
//!     println!("archived {} events", result.event_count);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod compression;
pub mod config;
pub mod error;
pub mod event_store;
pub mod logging;
pub mod migration;
pub mod service;
pub mod types;
pub mod utils;
pub mod versioning;

// Re-export commonly used items at crate root
pub use archive::{ArchiveConfig, ArchiveOverrides, Archiver, RetentionPolicy, TriggerConditions};
pub use compression::Compressor;
pub use config::LifecycleConfig;
pub use error::{ErrorKind, LifecycleError, LifecycleResult};
pub use event_store::{ArchiveCriteria, ArchiveJob, EventSource, InMemoryEventStore, JsonlEventStore};
pub use logging::LogFormat;
pub use migration::{MigrationScript, VersionMigrator};
pub use service::{LifecycleService, RetentionSweeper};
pub use types::{
    ArchiveFilters, ArchiveInfo, ArchiveRecord, ArchiveResult, ArchiveStrategy,
    CompatibilityResult, CompatibilityType, CompressionAlgorithm, CompressionConfig,
    CompressionResult, EventPayload, EventRecord, EventVersion, RiskLevel,
};
pub use versioning::{SemanticVersion, VersionManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
