//! Archive job: fetch cold events, archive them, delete them from the store

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::archive::{ArchiveOverrides, Archiver};
use crate::error::LifecycleResult;
use crate::types::ArchiveResult;
use crate::utils::CancelFlag;

use super::source::{ArchiveCriteria, EventSource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveJobReport {
    pub fetched: usize,
    /// `None` when nothing matched the criteria
    pub archive: Option<ArchiveResult>,
    /// Events removed from the store after a successful archive
    pub deleted: usize,
}

/// One archive pass over an [`EventSource`]
#[derive(Debug, Clone, Default)]
pub struct ArchiveJob {
    pub criteria: ArchiveCriteria,
    pub overrides: ArchiveOverrides,
}

impl ArchiveJob {
    pub fn new(criteria: ArchiveCriteria) -> Self {
        Self {
            criteria,
            overrides: ArchiveOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: ArchiveOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Run the pass.
    ///
    /// Without `older_than_days` in the criteria, the archive config's
    /// `time_interval_days` applies. Events are deleted from the source
    /// only when the archive succeeded, and only those written to it.
    pub fn run(&self, source: &dyn EventSource, archiver: &Archiver) -> LifecycleResult<ArchiveJobReport> {
        self.run_inner(source, archiver, None)
    }

    /// [`ArchiveJob::run`] whose archive is abandoned once `cancel` fires.
    /// A cancelled archive deletes nothing from the source.
    pub fn run_cancellable(
        &self,
        source: &dyn EventSource,
        archiver: &Archiver,
        cancel: &CancelFlag,
    ) -> LifecycleResult<ArchiveJobReport> {
        self.run_inner(source, archiver, Some(cancel))
    }

    fn run_inner(
        &self,
        source: &dyn EventSource,
        archiver: &Archiver,
        cancel: Option<&CancelFlag>,
    ) -> LifecycleResult<ArchiveJobReport> {
        let mut criteria = self.criteria.clone();
        if criteria.older_than_days.is_none() {
            criteria.older_than_days = self
                .overrides
                .apply(archiver.config())
                .trigger_conditions
                .time_interval_days;
        }

        let records = source.fetch_events_for_archiving(&criteria)?;
        if records.is_empty() {
            info!(?criteria, "No events eligible for archiving");
            return Ok(ArchiveJobReport {
                fetched: 0,
                archive: None,
                deleted: 0,
            });
        }

        let result = match cancel {
            Some(cancel) => archiver.archive_events_cancellable(&records, &self.overrides, cancel),
            None => archiver.archive_events(&records, &self.overrides),
        };
        let deleted = if result.success {
            source.delete_events(&result.archived_event_ids)?
        } else {
            warn!(
                fetched = records.len(),
                error = result.error.as_deref().unwrap_or("unknown"),
                "Archive failed, events left in store"
            );
            0
        };

        info!(
            fetched = records.len(),
            archived = result.event_count,
            deleted,
            "Archive job finished"
        );
        Ok(ArchiveJobReport {
            fetched: records.len(),
            archive: Some(result),
            deleted,
        })
    }
}
