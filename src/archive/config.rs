//! Archive configuration
//!
//! `ArchiveConfig` holds the archiver's defaults; `ArchiveOverrides` is the
//! per-call patch merged over them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{ArchiveStrategy, CompressionConfig, RetentionTier};
use crate::utils::bytes_to_mb;

/// When a batch is worth archiving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerConditions {
    /// Events older than this many days are selected for archiving
    pub time_interval_days: Option<u32>,
    #[serde(rename = "sizeThresholdMB")]
    pub size_threshold_mb: Option<f64>,
    pub event_count_threshold: Option<usize>,
}

impl Default for TriggerConditions {
    fn default() -> Self {
        Self {
            time_interval_days: Some(30),
            size_threshold_mb: Some(100.0),
            event_count_threshold: Some(10_000),
        }
    }
}

/// Hot/warm/cold age windows, in days
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetentionPolicy {
    pub hot_data_days: u32,
    pub warm_data_days: u32,
    /// Archives older than this are deleted by retention cleanup
    pub cold_data_retention_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            hot_data_days: 7,
            warm_data_days: 30,
            cold_data_retention_days: 365,
        }
    }
}

impl RetentionPolicy {
    pub fn with_cold_retention(days: u32) -> Self {
        Self {
            cold_data_retention_days: days,
            ..Default::default()
        }
    }

    pub fn classify(&self, age_days: i64) -> RetentionTier {
        if age_days <= i64::from(self.hot_data_days) {
            RetentionTier::Hot
        } else if age_days <= i64::from(self.warm_data_days) {
            RetentionTier::Warm
        } else if age_days <= i64::from(self.cold_data_retention_days) {
            RetentionTier::Cold
        } else {
            RetentionTier::Expired
        }
    }

    pub fn is_expired(&self, age_days: i64) -> bool {
        age_days > i64::from(self.cold_data_retention_days)
    }
}

/// Full archive configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub strategy: ArchiveStrategy,
    pub trigger_conditions: TriggerConditions,
    pub compression: CompressionConfig,
    /// Directory archive blobs are written to
    pub storage_location: PathBuf,
    pub retention: RetentionPolicy,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: ArchiveStrategy::ByTime,
            trigger_conditions: TriggerConditions::default(),
            compression: CompressionConfig::default(),
            storage_location: PathBuf::from("data").join("archive"),
            retention: RetentionPolicy::default(),
        }
    }
}

impl ArchiveConfig {
    /// Default config writing blobs under `storage_location`
    pub fn new<P: Into<PathBuf>>(storage_location: P) -> Self {
        Self {
            storage_location: storage_location.into(),
            ..Default::default()
        }
    }

    /// Whether a batch of `event_count` events totalling `total_bytes`
    /// (serialized) meets the trigger conditions.
    ///
    /// Requires `enabled` and a non-empty batch. With neither a count nor a
    /// size threshold configured, any non-empty batch qualifies.
    pub fn should_archive(&self, event_count: usize, total_bytes: u64) -> bool {
        if !self.enabled || event_count == 0 {
            return false;
        }

        let triggers = &self.trigger_conditions;
        if triggers.event_count_threshold.is_none() && triggers.size_threshold_mb.is_none() {
            return true;
        }

        let count_met = triggers
            .event_count_threshold
            .map_or(false, |threshold| event_count >= threshold);
        let size_met = triggers
            .size_threshold_mb
            .map_or(false, |threshold| bytes_to_mb(total_bytes) >= threshold);

        count_met || size_met
    }
}

/// Per-call patch over the archiver's default [`ArchiveConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiveOverrides {
    pub enabled: Option<bool>,
    pub strategy: Option<ArchiveStrategy>,
    pub trigger_conditions: Option<TriggerConditions>,
    pub compression: Option<CompressionConfig>,
    pub storage_location: Option<PathBuf>,
    pub retention: Option<RetentionPolicy>,
}

impl ArchiveOverrides {
    pub fn strategy(mut self, strategy: ArchiveStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn trigger_conditions(mut self, triggers: TriggerConditions) -> Self {
        self.trigger_conditions = Some(triggers);
        self
    }

    pub fn compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn storage_location<P: Into<PathBuf>>(mut self, location: P) -> Self {
        self.storage_location = Some(location.into());
        self
    }

    /// Merge the set fields over `base`
    pub fn apply(&self, base: &ArchiveConfig) -> ArchiveConfig {
        ArchiveConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            strategy: self.strategy.unwrap_or(base.strategy),
            trigger_conditions: self
                .trigger_conditions
                .clone()
                .unwrap_or_else(|| base.trigger_conditions.clone()),
            compression: self
                .compression
                .clone()
                .unwrap_or_else(|| base.compression.clone()),
            storage_location: self
                .storage_location
                .clone()
                .unwrap_or_else(|| base.storage_location.clone()),
            retention: self
                .retention
                .clone()
                .unwrap_or_else(|| base.retention.clone()),
        }
    }
}
