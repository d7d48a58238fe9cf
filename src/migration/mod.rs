//! Event payload migration between schema versions
//!
//! Scripts are single hops `(event type, from, to)`. A request with no direct
//! script is served by the shortest chain of hops; with no chain either, the
//! payload passes through unchanged.

mod migrator;
mod script;
mod validation;

pub use migrator::{
    extract_event_type, BatchFailure, BatchMigration, BatchMigrationSummary, MigrationProgress,
    VersionMigrator, PROGRESS_INTERVAL,
};
pub use script::{MigrationScript, TransformError, TransformFn};
pub use validation::ValidationRule;
