//! Compression configuration and result types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported compression algorithms
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    None,
    #[default]
    Gzip,
    Brotli,
    Lz4,
    Zstd,
}

impl CompressionAlgorithm {
    /// Every algorithm this build can encode and decode
    pub const ALL: [CompressionAlgorithm; 5] = [
        CompressionAlgorithm::None,
        CompressionAlgorithm::Gzip,
        CompressionAlgorithm::Brotli,
        CompressionAlgorithm::Lz4,
        CompressionAlgorithm::Zstd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Gzip => "gzip",
            CompressionAlgorithm::Brotli => "brotli",
            CompressionAlgorithm::Lz4 => "lz4",
            CompressionAlgorithm::Zstd => "zstd",
        }
    }

    /// Conventional file extension for data in this encoding
    pub fn extension(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "json",
            CompressionAlgorithm::Gzip => "gz",
            CompressionAlgorithm::Brotli => "br",
            CompressionAlgorithm::Lz4 => "lz4",
            CompressionAlgorithm::Zstd => "zst",
        }
    }

    /// One-byte tag used in the archive blob format
    pub fn tag(&self) -> u8 {
        match self {
            CompressionAlgorithm::None => 0,
            CompressionAlgorithm::Gzip => 1,
            CompressionAlgorithm::Brotli => 2,
            CompressionAlgorithm::Lz4 => 3,
            CompressionAlgorithm::Zstd => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CompressionAlgorithm::None),
            1 => Some(CompressionAlgorithm::Gzip),
            2 => Some(CompressionAlgorithm::Brotli),
            3 => Some(CompressionAlgorithm::Lz4),
            4 => Some(CompressionAlgorithm::Zstd),
            _ => None,
        }
    }

    /// Clamp a requested level into the range the encoder accepts.
    ///
    /// lz4 has no levels; the value is returned unchanged and ignored.
    pub fn clamp_level(&self, level: u32) -> u32 {
        match self {
            CompressionAlgorithm::None | CompressionAlgorithm::Lz4 => level,
            CompressionAlgorithm::Gzip => level.min(9),
            CompressionAlgorithm::Brotli => level.min(11),
            CompressionAlgorithm::Zstd => level.clamp(1, 22),
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionAlgorithm::None),
            "gzip" | "gz" => Ok(CompressionAlgorithm::Gzip),
            "brotli" | "br" => Ok(CompressionAlgorithm::Brotli),
            "lz4" => Ok(CompressionAlgorithm::Lz4),
            "zstd" | "zst" => Ok(CompressionAlgorithm::Zstd),
            other => Err(format!("unknown compression algorithm: {}", other)),
        }
    }
}

/// Configuration for a single compression call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressionConfig {
    pub algorithm: CompressionAlgorithm,
    pub level: u32,
    /// Inputs smaller than this are stored uncompressed
    pub min_size: usize,
    /// Inputs larger than this are stored uncompressed
    pub max_size: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            algorithm: CompressionAlgorithm::Gzip,
            level: 6,
            min_size: 1024,
            max_size: None,
            timeout_ms: Some(30_000),
        }
    }
}

impl CompressionConfig {
    /// Config for `algorithm` that compresses inputs of any size
    pub fn with_algorithm(algorithm: CompressionAlgorithm) -> Self {
        Self {
            algorithm,
            min_size: 0,
            ..Default::default()
        }
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Whether an input of `size` bytes falls inside the compression window
    pub fn in_size_window(&self, size: usize) -> bool {
        size >= self.min_size && self.max_size.map_or(true, |max| size <= max)
    }
}

/// Outcome of compressing one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionResult {
    #[serde(skip)]
    pub compressed_bytes: Vec<u8>,
    pub original_size: u64,
    pub compressed_size: u64,
    /// `original_size / compressed_size`
    pub ratio: f64,
    pub algorithm: CompressionAlgorithm,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompressionResult {
    /// A failed result carrying only the error and the attempted algorithm
    pub fn failed(algorithm: CompressionAlgorithm, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            compressed_bytes: Vec::new(),
            original_size: 0,
            compressed_size: 0,
            ratio: 0.0,
            algorithm,
            duration_ms,
            success: false,
            error: Some(error.into()),
        }
    }

    /// Bytes saved by compression (0 when the output grew)
    pub fn space_saved(&self) -> u64 {
        self.original_size.saturating_sub(self.compressed_size)
    }
}

/// Heuristic answer to "is compression worthwhile for this record?"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionEffect {
    pub recommended: bool,
    pub estimated_ratio: f64,
    pub estimated_size: u64,
}

impl CompressionEffect {
    pub fn not_recommended(estimated_size: u64) -> Self {
        Self {
            recommended: false,
            estimated_ratio: 1.0,
            estimated_size,
        }
    }
}

/// Aggregate over a batch of compression results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub original_size: u64,
    pub compressed_size: u64,
    pub ratio: f64,
    pub duration_ms: u64,
}

impl CompressionSummary {
    pub fn from_results(results: &[CompressionResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Default::default()
        };

        for result in results {
            summary.duration_ms += result.duration_ms;
            if result.success {
                summary.succeeded += 1;
                summary.original_size += result.original_size;
                summary.compressed_size += result.compressed_size;
            } else {
                summary.failed += 1;
            }
        }

        summary.ratio = if summary.compressed_size == 0 {
            0.0
        } else {
            summary.original_size as f64 / summary.compressed_size as f64
        };

        summary
    }
}
