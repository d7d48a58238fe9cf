//! Event Lifecycle - Binary Entry Point
//!
//! Operates on the archive and the version registry under
//! `EVENT_LIFECYCLE_DATA_DIR` (or a JSON archive config given with
//! `--config`). Results go to stdout as JSON, logs to stderr.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use event_lifecycle::archive::{ArchiveConfig, ArchiveOverrides, Archiver};
use event_lifecycle::config::LifecycleConfig;
use event_lifecycle::error::{LifecycleError, LifecycleResult};
use event_lifecycle::event_store::{ArchiveCriteria, ArchiveJob, JsonlEventStore};
use event_lifecycle::logging::{self, LogFormat};
use event_lifecycle::service::RetentionSweeper;
use event_lifecycle::types::{ArchiveFilters, ArchiveStrategy, EventVersion};
use event_lifecycle::versioning::VersionManager;

/// Archive, inspect and expire event archives
#[derive(Parser)]
#[command(name = "event-lifecycle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON archive config; overrides the environment's archive location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log format (compact, pretty, json)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive cold events from a JSONL event log
    Archive {
        /// Event log; defaults to <data dir>/events.jsonl
        #[arg(short, long)]
        events: Option<PathBuf>,

        /// Only events at least this many days old
        #[arg(long)]
        older_than_days: Option<u32>,

        /// Only these event types
        #[arg(long = "event-type")]
        event_types: Vec<String>,

        #[arg(long)]
        tenant: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        /// BY_TIME, BY_EVENT_TYPE, BY_TENANT, BY_SIZE or HYBRID
        #[arg(long)]
        strategy: Option<ArchiveStrategy>,
    },

    /// List archives, newest first
    List {
        #[arg(long)]
        event_type: Option<String>,

        #[arg(long)]
        tenant: Option<String>,

        /// Created at or after (RFC 3339)
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Created at or before (RFC 3339)
        #[arg(long)]
        until: Option<DateTime<Utc>>,
    },

    /// Show one archive
    Info { id: Uuid },

    /// Totals across all archives
    Stats,

    /// Delete archives past cold retention
    Cleanup {
        /// Override the configured cold retention window
        #[arg(long)]
        retention_days: Option<u32>,
    },

    /// Check an archive blob against its index entry
    Verify { id: Uuid },

    /// Print the events stored in an archive
    Restore {
        id: Uuid,

        /// Only these event ids
        #[arg(long = "event-id")]
        event_ids: Vec<String>,
    },

    /// Remove blobs and temp files no index entry references
    PruneOrphans,

    /// Run retention cleanup periodically until Ctrl+C
    Sweep {
        #[arg(long, default_value = "3600")]
        interval_secs: u64,
    },

    /// List registered schema versions, highest first
    Versions {
        /// Only this event type
        event_type: Option<String>,
    },

    /// Register a schema version in the version registry
    RegisterVersion {
        event_type: String,
        version: String,

        /// JSON schema file
        #[arg(long)]
        schema: Option<PathBuf>,

        #[arg(long)]
        backward_compatible: bool,
    },

    /// Mark a registered version deprecated
    Deprecate { event_type: String, version: String },

    /// Classify reading `from` data as `to`
    Compat {
        event_type: String,
        from: String,
        to: String,
    },
}

#[tokio::main]
async fn main() -> LifecycleResult<()> {
    let cli = Cli::parse();
    let settings = LifecycleConfig::from_env();
    logging::init(cli.log_format.unwrap_or(settings.log_format));

    if let Some(result) = run_version_command(&cli.command, &settings) {
        return result;
    }

    let archiver = open_archiver(&settings, cli.config.as_deref())?;

    match cli.command {
        Commands::Archive {
            events,
            older_than_days,
            event_types,
            tenant,
            limit,
            strategy,
        } => {
            let store = JsonlEventStore::new(events.unwrap_or_else(|| settings.events_path.clone()));
            let criteria = ArchiveCriteria {
                older_than_days,
                event_types,
                tenant_id: tenant,
                limit,
            };
            let mut overrides = ArchiveOverrides::default();
            if let Some(strategy) = strategy {
                overrides = overrides.strategy(strategy);
            }
            let report = ArchiveJob::new(criteria)
                .with_overrides(overrides)
                .run(&store, &archiver)?;
            print_json(&report)
        }
        Commands::List {
            event_type,
            tenant,
            since,
            until,
        } => {
            let filters = ArchiveFilters {
                start_date: since,
                end_date: until,
                event_type,
                tenant_id: tenant,
            };
            print_json(&archiver.list_archives(&filters))
        }
        Commands::Info { id } => {
            let info = archiver
                .get_archive_info(id)
                .ok_or(LifecycleError::ArchiveNotFound(id))?;
            print_json(&info)
        }
        Commands::Stats => print_json(&archiver.archive_stats()),
        Commands::Cleanup { retention_days } => {
            let mut policy = archiver.config().retention.clone();
            if let Some(days) = retention_days {
                policy.cold_data_retention_days = days;
            }
            print_json(&archiver.cleanup_expired_archives(&policy))
        }
        Commands::Verify { id } => print_json(&archiver.verify_archive(id)?),
        Commands::Restore { id, event_ids } => {
            let filter = (!event_ids.is_empty()).then_some(event_ids.as_slice());
            print_json(&archiver.restore_events(id, filter)?)
        }
        Commands::PruneOrphans => {
            let removed = archiver.cleanup_orphaned_blobs()?;
            print_json(&serde_json::json!({ "removed": removed }))
        }
        Commands::Sweep { interval_secs } => {
            let policy = archiver.config().retention.clone();
            let sweeper = RetentionSweeper::new(
                Arc::new(archiver),
                policy,
                Duration::from_secs(interval_secs.max(1)),
            );

            let (tx, rx) = watch::channel(false);
            ctrlc::set_handler(move || {
                let _ = tx.send(true);
            })
            .map_err(|e| LifecycleError::Cancelled(format!("failed to install signal handler: {}", e)))?;

            info!("Press Ctrl+C to stop");
            let sweeps = sweeper.run(rx).await;
            print_json(&serde_json::json!({ "sweeps": sweeps }))
        }
        // Served by run_version_command
        Commands::Versions { .. }
        | Commands::RegisterVersion { .. }
        | Commands::Deprecate { .. }
        | Commands::Compat { .. } => Ok(()),
    }
}

/// Commands served by the version registry alone; `None` for archive commands.
fn run_version_command(command: &Commands, settings: &LifecycleConfig) -> Option<LifecycleResult<()>> {
    let open = || VersionManager::with_persistence(&settings.versions_path);

    let result = match command {
        Commands::Versions { event_type } => open().and_then(|registry| {
            let types = match event_type {
                Some(event_type) => vec![event_type.clone()],
                None => registry.event_types(),
            };
            let listing: BTreeMap<String, Vec<EventVersion>> = types
                .into_iter()
                .map(|event_type| {
                    let versions = registry.get_all_versions(&event_type);
                    (event_type, versions)
                })
                .collect();
            print_json(&listing)
        }),
        Commands::RegisterVersion {
            event_type,
            version,
            schema,
            backward_compatible,
        } => open().and_then(|registry| {
            let mut entry = EventVersion::new(event_type.as_str(), version.as_str())
                .backward_compatible(*backward_compatible);
            if let Some(path) = schema {
                let raw = fs::read_to_string(path).map_err(LifecycleError::Io)?;
                entry = entry.with_schema(serde_json::from_str(&raw)?);
            }
            registry.register_version(event_type, entry)?;
            print_json(&registry.require_version(event_type, version)?)
        }),
        Commands::Deprecate { event_type, version } => open().and_then(|registry| {
            registry.require_version(event_type, version)?;
            if !registry.deprecate_version(event_type, version, None) {
                return Err(LifecycleError::Validation(format!(
                    "could not record deprecation of {} {}",
                    event_type, version
                )));
            }
            print_json(&registry.require_version(event_type, version)?)
        }),
        Commands::Compat { event_type, from, to } => open().and_then(|registry| {
            print_json(&registry.check_compatibility(event_type, from, to))
        }),
        _ => return None,
    };
    Some(result)
}

fn open_archiver(settings: &LifecycleConfig, config_path: Option<&Path>) -> LifecycleResult<Archiver> {
    match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|e| LifecycleError::archive_io(path, e))?;
            let config: ArchiveConfig = serde_json::from_str(&raw)?;
            Archiver::new(config)
        }
        None => Archiver::open(settings.archive_config(), &settings.index_path),
    }
}

fn print_json<T: Serialize>(value: &T) -> LifecycleResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
