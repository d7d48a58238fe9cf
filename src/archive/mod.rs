//! Event archiving
//!
//! Moves cold event batches out of the primary store into compressed,
//! self-describing blobs and keeps an index of them.
//!
//! # Storage layout
//!
//! ```text
//! <storage_location>/
//! ├── archive_index.json               # archive id -> ArchiveRecord
//! ├── archive_<uuid>.evar              # one blob per archive
//! └── archive_<uuid>.tmp               # in-flight write, removed on open
//! ```
//!
//! # Lifecycle
//!
//! 1. `archive_events` orders the batch by [`ArchiveStrategy`], compresses
//!    each record and writes the blob, then adds the index entry
//! 2. `restore_events` decodes a blob back into event records
//! 3. `cleanup_expired_archives` deletes archives past cold retention
//!
//! [`ArchiveStrategy`]: crate::types::ArchiveStrategy

pub(crate) mod blob;
mod config;
mod index;
mod query;
mod retention;
mod strategy;

mod archiver;

pub use archiver::{Archiver, INDEX_FILE_NAME};
pub use config::{ArchiveConfig, ArchiveOverrides, RetentionPolicy, TriggerConditions};
pub use index::ArchiveIndex;
pub use strategy::order_records;
