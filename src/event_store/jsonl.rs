//! File-backed event store: one JSON event record per line
//!
//! Appends go straight to the end of the log with an fsync. Deletions
//! rewrite the log atomically without the removed records.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::EventRecord;
use crate::utils::atomic_write_with;

use super::source::{ArchiveCriteria, EventSource};

pub struct JsonlEventStore {
    path: PathBuf,
    /// Serializes appends and rewrites
    write_lock: Mutex<()>,
}

impl JsonlEventStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &EventRecord) -> LifecycleResult<()> {
        let _guard = self.write_lock.lock();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{}", line)?;
        file.sync_all()?;
        Ok(())
    }

    /// Load every record; unparseable lines are logged and skipped.
    pub fn load_events(&self) -> LifecycleResult<Vec<EventRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut events = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<EventRecord>(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = line_num + 1,
                    error = %e,
                    "Skipping unparseable event"
                ),
            }
        }

        Ok(events)
    }
}

impl EventSource for JsonlEventStore {
    fn fetch_events_for_archiving(&self, criteria: &ArchiveCriteria) -> LifecycleResult<Vec<EventRecord>> {
        let events = self.load_events()?;
        Ok(criteria.select(&events, Utc::now()))
    }

    fn delete_events(&self, ids: &[String]) -> LifecycleResult<usize> {
        let _guard = self.write_lock.lock();

        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let events = self.load_events()?;
        let before = events.len();
        let kept: Vec<&EventRecord> = events
            .iter()
            .filter(|e| !ids.contains(e.id.as_str()))
            .collect();
        let deleted = before - kept.len();
        if deleted == 0 {
            return Ok(0);
        }

        atomic_write_with(&self.path, |file| {
            let mut writer = BufWriter::new(file);
            for event in &kept {
                serde_json::to_writer(&mut writer, event)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()
        })
        .map_err(|e| LifecycleError::archive_io(&self.path, e))?;

        info!(path = %self.path.display(), deleted, remaining = kept.len(), "Deleted archived events");
        Ok(deleted)
    }
}
