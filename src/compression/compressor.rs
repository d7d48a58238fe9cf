//! Stateless record compressor

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{
    CompressionAlgorithm, CompressionConfig, CompressionEffect, CompressionResult, CompressionSummary,
};
use crate::utils::elapsed_ms;

use super::codec::{self, CodecError};

/// Bytes sampled by [`Compressor::check_compression_effect`]
const EFFECT_SAMPLE_SIZE: usize = 64 * 1024;
/// Estimated ratio below which compression is not worth the CPU
const MIN_WORTHWHILE_RATIO: f64 = 1.1;
/// Framing for empty input when the configured algorithm is `none`
const EMPTY_INPUT_ALGORITHM: CompressionAlgorithm = CompressionAlgorithm::Gzip;

/// Compresses and decompresses structured records.
///
/// Records are serialized to JSON and the bytes are framed by the selected
/// algorithm. The compressor holds no per-call state; batch work runs on
/// rayon, optionally on a dedicated bounded pool.
#[derive(Clone, Default)]
pub struct Compressor {
    defaults: CompressionConfig,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Compressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compressor whose [`Compressor::default_config`] is `defaults`
    pub fn with_config(defaults: CompressionConfig) -> Self {
        Self {
            defaults,
            pool: None,
        }
    }

    /// Run batch compression on a dedicated pool of `workers` threads
    pub fn with_workers(mut self, workers: usize) -> LifecycleResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("compress-{}", i))
            .build()
            .map_err(|e| {
                LifecycleError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;
        self.pool = Some(Arc::new(pool));
        Ok(self)
    }

    pub fn default_config(&self) -> &CompressionConfig {
        &self.defaults
    }

    /// Serialize `record` and compress it.
    ///
    /// Inputs outside `[min_size, max_size]` are stored with algorithm
    /// `none`. Fails with `CompressionTimeout` when `timeout_ms` elapses.
    pub fn compress<T: Serialize + ?Sized>(
        &self,
        record: &T,
        config: &CompressionConfig,
    ) -> LifecycleResult<CompressionResult> {
        let bytes = serde_json::to_vec(record)?;
        self.compress_bytes(&bytes, config)
    }

    /// Compress an already-serialized payload.
    ///
    /// Empty input bypasses the size window and is framed by the configured
    /// codec, or by gzip when that is `none`, so `compressed_size` is never 0.
    pub fn compress_bytes(
        &self,
        data: &[u8],
        config: &CompressionConfig,
    ) -> LifecycleResult<CompressionResult> {
        let start = Instant::now();
        let original_size = data.len() as u64;

        let algorithm = if data.is_empty() {
            // Zero bytes cannot be stored unframed; a codec frame always has a size
            match config.algorithm {
                CompressionAlgorithm::None => EMPTY_INPUT_ALGORITHM,
                configured => configured,
            }
        } else if config.in_size_window(data.len()) {
            config.algorithm
        } else {
            debug!(
                size = data.len(),
                min_size = config.min_size,
                max_size = ?config.max_size,
                "Input outside compression window, storing uncompressed"
            );
            CompressionAlgorithm::None
        };

        let deadline = match algorithm {
            CompressionAlgorithm::None => None,
            _ => config
                .timeout_ms
                .map(|ms| start + Duration::from_millis(ms)),
        };
        let level = algorithm.clamp_level(config.level);

        let compressed = codec::encode(algorithm, level, data, deadline).map_err(|e| {
            let err = match e {
                CodecError::Timeout => LifecycleError::CompressionTimeout {
                    algorithm,
                    timeout_ms: config.timeout_ms.unwrap_or_default(),
                },
                CodecError::Io(io) => LifecycleError::Compression {
                    algorithm,
                    cause: io.to_string(),
                },
            };
            warn!(
                %algorithm,
                original_size,
                duration_ms = elapsed_ms(start),
                error = %err,
                "Compression failed"
            );
            err
        })?;

        let compressed_size = compressed.len() as u64;
        let ratio = if algorithm == CompressionAlgorithm::None || compressed_size == 0 {
            1.0
        } else {
            original_size as f64 / compressed_size as f64
        };
        let duration_ms = elapsed_ms(start);

        debug!(
            %algorithm,
            original_size,
            compressed_size,
            ratio,
            duration_ms,
            "Compressed payload"
        );

        Ok(CompressionResult {
            compressed_bytes: compressed,
            original_size,
            compressed_size,
            ratio,
            algorithm,
            duration_ms,
            success: true,
            error: None,
        })
    }

    /// Decompress and deserialize a record.
    ///
    /// Bytes that do not match `algorithm`'s framing, or that do not decode
    /// into `T`, fail with `Decompression`.
    pub fn decompress<T: DeserializeOwned>(
        &self,
        bytes: &[u8],
        algorithm: CompressionAlgorithm,
    ) -> LifecycleResult<T> {
        let raw = self.decompress_bytes(bytes, algorithm)?;
        serde_json::from_slice(&raw).map_err(|e| LifecycleError::Decompression {
            algorithm,
            cause: format!("decoded bytes are not a valid record: {}", e),
        })
    }

    pub fn decompress_bytes(
        &self,
        bytes: &[u8],
        algorithm: CompressionAlgorithm,
    ) -> LifecycleResult<Vec<u8>> {
        codec::decode(algorithm, bytes).map_err(|e| LifecycleError::Decompression {
            algorithm,
            cause: e.to_string(),
        })
    }

    /// Compress every record; one result per input, in input order.
    ///
    /// A failing record yields `success = false` and does not stop the rest.
    pub fn compress_batch<T: Serialize + Sync>(
        &self,
        records: &[T],
        config: &CompressionConfig,
    ) -> Vec<CompressionResult> {
        let run = || {
            records
                .par_iter()
                .enumerate()
                .map(|(index, record)| {
                    let start = Instant::now();
                    self.compress(record, config).unwrap_or_else(|e| {
                        warn!(index, error = %e, "Batch item compression failed");
                        CompressionResult::failed(config.algorithm, e.to_string(), elapsed_ms(start))
                    })
                })
                .collect::<Vec<_>>()
        };

        let results = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let summary = CompressionSummary::from_results(&results);
        debug!(
            algorithm = %config.algorithm,
            total = summary.total,
            failed = summary.failed,
            ratio = summary.ratio,
            duration_ms = summary.duration_ms,
            "Compressed batch"
        );
        results
    }

    /// Algorithms this build can encode and decode; always includes `none`
    pub fn supported_algorithms(&self) -> BTreeSet<CompressionAlgorithm> {
        CompressionAlgorithm::ALL.into_iter().collect()
    }

    /// Estimate whether compressing `record` under `config` pays off.
    ///
    /// Compresses at most the first 64 KiB of the serialized record. Never
    /// fails: unserializable input yields `recommended = false` and ratio 1.0.
    pub fn check_compression_effect<T: Serialize + ?Sized>(
        &self,
        record: &T,
        config: &CompressionConfig,
    ) -> CompressionEffect {
        let bytes = match serde_json::to_vec(record) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "Record not serializable, compression not recommended");
                return CompressionEffect::not_recommended(0);
            }
        };
        let size = bytes.len() as u64;

        if config.algorithm == CompressionAlgorithm::None || !config.in_size_window(bytes.len()) {
            return CompressionEffect::not_recommended(size);
        }

        let sample = &bytes[..bytes.len().min(EFFECT_SAMPLE_SIZE)];
        let level = config.algorithm.clamp_level(config.level);

        match codec::encode(config.algorithm, level, sample, None) {
            Ok(encoded) if !encoded.is_empty() => {
                let estimated_ratio = sample.len() as f64 / encoded.len() as f64;
                CompressionEffect {
                    recommended: estimated_ratio >= MIN_WORTHWHILE_RATIO,
                    estimated_ratio,
                    estimated_size: (size as f64 / estimated_ratio).ceil() as u64,
                }
            }
            _ => CompressionEffect::not_recommended(size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde_json::{json, Value};

    /// Serializes normally unless `poisoned`
    struct Item {
        value: u32,
        poisoned: bool,
    }

    impl Serialize for Item {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if self.poisoned {
                return Err(S::Error::custom("poisoned item"));
            }
            serializer.serialize_u32(self.value)
        }
    }

    fn order(i: usize) -> Value {
        json!({
            "eventType": "OrderPlaced",
            "orderId": format!("order-{}", i),
            "lines": (0..20).map(|n| json!({"sku": "SKU-123", "qty": n})).collect::<Vec<_>>(),
        })
    }

    #[test]
    fn test_round_trip_every_algorithm() {
        let compressor = Compressor::new();
        let record = order(1);
        for algorithm in compressor.supported_algorithms() {
            let config = CompressionConfig::with_algorithm(algorithm);
            let result = compressor.compress(&record, &config).unwrap();
            assert!(result.success);
            assert_eq!(result.algorithm, algorithm);
            let restored: Value = compressor
                .decompress(&result.compressed_bytes, result.algorithm)
                .unwrap();
            assert_eq!(restored, record);
        }
    }

    #[test]
    fn test_none_has_unit_ratio() {
        let compressor = Compressor::new();
        let config = CompressionConfig::with_algorithm(CompressionAlgorithm::None);
        let result = compressor.compress(&order(1), &config).unwrap();
        assert_eq!(result.ratio, 1.0);
        assert_eq!(result.original_size, result.compressed_size);
    }

    #[test]
    fn test_empty_input_has_nonzero_size() {
        let compressor = Compressor::new();
        for algorithm in CompressionAlgorithm::ALL {
            let config = CompressionConfig::with_algorithm(algorithm);
            let result = compressor.compress(&json!({}), &config).unwrap();
            assert!(result.compressed_size >= 1, "{}", algorithm);
        }
    }

    #[test]
    fn test_empty_bytes_are_framed() {
        let compressor = Compressor::new();
        let mut configs: Vec<CompressionConfig> = CompressionAlgorithm::ALL
            .into_iter()
            .map(CompressionConfig::with_algorithm)
            .collect();
        configs.push(CompressionConfig::default());

        for config in &configs {
            let result = compressor.compress_bytes(&[], config).unwrap();
            assert!(result.compressed_size >= 1, "{}", config.algorithm);
            assert_ne!(result.algorithm, CompressionAlgorithm::None);
            assert!(compressor
                .decompress_bytes(&result.compressed_bytes, result.algorithm)
                .unwrap()
                .is_empty());
        }
    }

    #[test]
    fn test_below_min_size_is_stored_uncompressed() {
        let compressor = Compressor::new();
        let config = CompressionConfig::default().min_size(1_000_000);
        let result = compressor.compress(&order(1), &config).unwrap();
        assert_eq!(result.algorithm, CompressionAlgorithm::None);
        assert_eq!(result.ratio, 1.0);
    }

    #[test]
    fn test_zero_timeout_fails_with_timeout() {
        let compressor = Compressor::new();
        let config = CompressionConfig::with_algorithm(CompressionAlgorithm::Gzip).timeout_ms(0);
        let err = compressor.compress(&order(1), &config).unwrap_err();
        assert!(matches!(err, LifecycleError::CompressionTimeout { .. }));
    }

    #[test]
    fn test_decompress_rejects_mismatched_algorithm() {
        let compressor = Compressor::new();
        let config = CompressionConfig::with_algorithm(CompressionAlgorithm::Zstd);
        let result = compressor.compress(&order(1), &config).unwrap();

        let err = compressor
            .decompress::<Value>(&result.compressed_bytes, CompressionAlgorithm::Gzip)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Decompression { .. }));

        let err = compressor
            .decompress::<Value>(b"\x00\x01garbage", CompressionAlgorithm::None)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Decompression { .. }));
    }

    #[test]
    fn test_batch_preserves_order_and_isolates_failures() {
        let compressor = Compressor::new().with_workers(2).unwrap();
        let items = vec![
            Item { value: 1, poisoned: false },
            Item { value: 2, poisoned: true },
            Item { value: 3, poisoned: false },
        ];
        let config = CompressionConfig::with_algorithm(CompressionAlgorithm::Lz4);

        let results = compressor.compress_batch(&items, &config);

        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap().contains("poisoned"));
        assert!(results[2].success);

        let third: u32 = compressor
            .decompress(&results[2].compressed_bytes, results[2].algorithm)
            .unwrap();
        assert_eq!(third, 3);
    }

    #[test]
    fn test_supported_algorithms_include_none() {
        assert!(Compressor::new()
            .supported_algorithms()
            .contains(&CompressionAlgorithm::None));
    }

    #[test]
    fn test_compression_effect() {
        let compressor = Compressor::new();
        let config = CompressionConfig::with_algorithm(CompressionAlgorithm::Gzip);

        let effect = compressor.check_compression_effect(&order(1), &config);
        assert!(effect.recommended);
        assert!(effect.estimated_ratio > 1.0);

        let poisoned = Item { value: 0, poisoned: true };
        let effect = compressor.check_compression_effect(&poisoned, &config);
        assert!(!effect.recommended);
        assert_eq!(effect.estimated_ratio, 1.0);

        let none = CompressionConfig::with_algorithm(CompressionAlgorithm::None);
        assert!(!compressor.check_compression_effect(&order(1), &none).recommended);
    }
}
