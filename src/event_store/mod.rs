//! Event store collaborator
//!
//! Archiving reads cold events from an [`EventSource`] and deletes them only
//! after they are archived. Two implementations ship with the crate:
//!
//! - `InMemoryEventStore`: a vector behind a lock, for tests and embedding
//! - `JsonlEventStore`: an append-only `events.jsonl` log
//!
//! `ArchiveJob` is the fetch, archive, delete pass that ties a source to an
//! [`crate::archive::Archiver`].

mod job;
mod jsonl;
mod memory;
mod source;

pub use job::{ArchiveJob, ArchiveJobReport};
pub use jsonl::JsonlEventStore;
pub use memory::InMemoryEventStore;
pub use source::{ArchiveCriteria, EventSource};
