//! Async facade over the blocking archiver
//!
//! `LifecycleService` moves archive, restore and cleanup work onto tokio's
//! blocking pool with an optional deadline. `RetentionSweeper` runs retention
//! cleanup on an interval until told to stop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::archive::{ArchiveOverrides, Archiver, RetentionPolicy};
use crate::error::{LifecycleError, LifecycleResult};
use crate::event_store::{ArchiveJob, ArchiveJobReport, EventSource};
use crate::types::{ArchiveResult, CleanupReport, EventRecord};
use crate::utils::CancelFlag;

#[derive(Clone)]
pub struct LifecycleService {
    archiver: Arc<Archiver>,
    /// Deadline per operation; `None` waits indefinitely
    timeout: Option<Duration>,
}

impl LifecycleService {
    pub fn new(archiver: Arc<Archiver>) -> Self {
        Self {
            archiver,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn archiver(&self) -> &Arc<Archiver> {
        &self.archiver
    }

    pub async fn archive(
        &self,
        records: Vec<EventRecord>,
        overrides: ArchiveOverrides,
    ) -> LifecycleResult<ArchiveResult> {
        self.run_blocking("archive", move |archiver, cancel| {
            Ok(archiver.archive_events_cancellable(&records, &overrides, cancel))
        })
        .await
    }

    pub async fn restore(
        &self,
        archive_id: Uuid,
        event_ids: Option<Vec<String>>,
    ) -> LifecycleResult<Vec<EventRecord>> {
        self.run_blocking("restore", move |archiver, _| {
            archiver.restore_events(archive_id, event_ids.as_deref())
        })
        .await
    }

    /// Every deletion is committed on its own, so a cleanup that times out
    /// keeps deleting in the background; running it again is safe.
    pub async fn cleanup(&self, policy: RetentionPolicy) -> LifecycleResult<CleanupReport> {
        self.run_blocking("cleanup", move |archiver, _| {
            Ok(archiver.cleanup_expired_archives(&policy))
        })
        .await
    }

    pub async fn run_job(
        &self,
        job: ArchiveJob,
        source: Arc<dyn EventSource>,
    ) -> LifecycleResult<ArchiveJobReport> {
        self.run_blocking("archive_job", move |archiver, cancel| {
            job.run_cancellable(source.as_ref(), archiver, cancel)
        })
        .await
    }

    /// Run `op` on the blocking pool.
    ///
    /// On timeout the flag handed to `op` is cancelled and the caller gets
    /// `Cancelled`. If `op` already passed its commit point, the deadline is
    /// ignored and the caller waits for the committed result instead.
    async fn run_blocking<T, F>(&self, operation: &'static str, op: F) -> LifecycleResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Archiver, &CancelFlag) -> LifecycleResult<T> + Send + 'static,
    {
        let archiver = Arc::clone(&self.archiver);
        let cancel = Arc::new(CancelFlag::new());
        let worker_cancel = Arc::clone(&cancel);
        let mut handle = tokio::task::spawn_blocking(move || op(&archiver, &worker_cancel));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) if cancel.cancel() => {
                    error!(operation, timeout_ms = limit.as_millis() as u64, "Operation timed out");
                    return Err(LifecycleError::Cancelled(format!(
                        "{} exceeded {}ms",
                        operation,
                        limit.as_millis()
                    )));
                }
                Err(_) => {
                    debug!(operation, "Deadline passed after commit, awaiting result");
                    handle.await
                }
            },
            None => handle.await,
        };

        joined.map_err(|e| LifecycleError::Cancelled(format!("{} task failed: {}", operation, e)))?
    }
}

/// Periodic retention cleanup
pub struct RetentionSweeper {
    archiver: Arc<Archiver>,
    policy: RetentionPolicy,
    interval: Duration,
}

/// Stops a spawned [`RetentionSweeper`]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<usize>,
}

impl SweeperHandle {
    /// Signal shutdown and wait for the loop to exit. Returns the number of
    /// sweeps that ran.
    pub async fn shutdown(self) -> LifecycleResult<usize> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| LifecycleError::Cancelled(format!("sweeper task failed: {}", e)))
    }
}

impl RetentionSweeper {
    pub fn new(archiver: Arc<Archiver>, policy: RetentionPolicy, interval: Duration) -> Self {
        Self {
            archiver,
            policy,
            interval,
        }
    }

    pub fn spawn(self) -> SweeperHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        SweeperHandle { shutdown: tx, task }
    }

    /// Sweep immediately, then once per interval, until `shutdown` turns
    /// true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut timer = tokio::time::interval(self.interval);
        let mut sweeps = 0usize;
        info!(
            interval_secs = self.interval.as_secs(),
            cold_retention_days = self.policy.cold_data_retention_days,
            "Retention sweeper started"
        );

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.sweep().await;
                    sweeps += 1;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(sweeps, "Retention sweeper stopped");
        sweeps
    }

    async fn sweep(&self) {
        let archiver = Arc::clone(&self.archiver);
        let policy = self.policy.clone();
        match tokio::task::spawn_blocking(move || archiver.cleanup_expired_archives(&policy)).await {
            Ok(report) if report.deleted_count > 0 || !report.failed_archives.is_empty() => info!(
                deleted = report.deleted_count,
                freed = report.freed_space,
                failed = report.failed_archives.len(),
                "Retention sweep finished"
            ),
            Ok(_) => debug!("Retention sweep found nothing to delete"),
            Err(e) => error!(error = %e, "Retention sweep panicked"),
        }
    }
}
