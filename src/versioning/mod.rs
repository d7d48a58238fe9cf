//! Event schema versioning
//!
//! - `SemanticVersion`: `major.minor.patch[-prerelease]` parsing and ordering
//! - `classify`: the ordered compatibility decision table
//! - `VersionManager`: registry of versions per event type, optionally
//!   persisted to a JSON file

mod compatibility;
mod manager;
mod persistence;
mod semantic;

pub use compatibility::classify;
pub use manager::VersionManager;
pub use semantic::{compare_versions, SemanticVersion};
