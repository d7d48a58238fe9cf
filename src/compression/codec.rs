//! Per-algorithm byte framing
//!
//! Encoders are fed in fixed-size chunks so a deadline can be checked
//! between chunks; compression of a large input can therefore be abandoned
//! without blocking until the whole buffer has been processed.

use std::io::{self, Read, Write};
use std::time::Instant;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::types::CompressionAlgorithm;

/// Input is handed to the encoder this many bytes at a time
const CHUNK_SIZE: usize = 64 * 1024;
const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_LG_WINDOW: u32 = 22;

#[derive(Debug)]
pub(crate) enum CodecError {
    /// The deadline passed before encoding finished
    Timeout,
    Io(io::Error),
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        CodecError::Io(e)
    }
}

/// Encode `data` with `algorithm`, giving up once `deadline` has passed.
pub(crate) fn encode(
    algorithm: CompressionAlgorithm,
    level: u32,
    data: &[u8],
    deadline: Option<Instant>,
) -> Result<Vec<u8>, CodecError> {
    match algorithm {
        CompressionAlgorithm::None => {
            check_deadline(deadline)?;
            Ok(data.to_vec())
        }
        CompressionAlgorithm::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
            write_chunked(&mut encoder, data, deadline)?;
            Ok(encoder.finish()?)
        }
        CompressionAlgorithm::Brotli => {
            let mut encoder = brotli::CompressorWriter::new(
                Vec::new(),
                BROTLI_BUFFER_SIZE,
                level,
                BROTLI_LG_WINDOW,
            );
            write_chunked(&mut encoder, data, deadline)?;
            // into_inner finishes the stream
            Ok(encoder.into_inner())
        }
        CompressionAlgorithm::Lz4 => {
            let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
            write_chunked(&mut encoder, data, deadline)?;
            encoder
                .finish()
                .map_err(|e| CodecError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
        }
        CompressionAlgorithm::Zstd => {
            let mut encoder = zstd::stream::write::Encoder::new(Vec::new(), level as i32)?;
            write_chunked(&mut encoder, data, deadline)?;
            Ok(encoder.finish()?)
        }
    }
}

/// Decode `data` that claims to be framed by `algorithm`.
pub(crate) fn decode(algorithm: CompressionAlgorithm, data: &[u8]) -> io::Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Gzip => read_all(GzDecoder::new(data)),
        CompressionAlgorithm::Brotli => {
            read_all(brotli::Decompressor::new(data, BROTLI_BUFFER_SIZE))
        }
        CompressionAlgorithm::Lz4 => read_all(lz4_flex::frame::FrameDecoder::new(data)),
        CompressionAlgorithm::Zstd => zstd::stream::decode_all(data),
    }
}

fn write_chunked<W: Write>(
    writer: &mut W,
    data: &[u8],
    deadline: Option<Instant>,
) -> Result<(), CodecError> {
    for chunk in data.chunks(CHUNK_SIZE) {
        check_deadline(deadline)?;
        writer.write_all(chunk)?;
    }
    check_deadline(deadline)
}

fn check_deadline(deadline: Option<Instant>) -> Result<(), CodecError> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(CodecError::Timeout),
        _ => Ok(()),
    }
}

fn read_all<R: Read>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample() -> Vec<u8> {
        br#"{"eventType":"OrderPlaced","amount":42}"#.repeat(200)
    }

    #[test]
    fn test_encode_decode_every_algorithm() {
        let data = sample();
        for algorithm in CompressionAlgorithm::ALL {
            let encoded = encode(algorithm, 6, &data, None).unwrap();
            let decoded = decode(algorithm, &encoded).unwrap();
            assert_eq!(decoded, data, "{} round trip", algorithm);
            if algorithm != CompressionAlgorithm::None {
                assert!(encoded.len() < data.len(), "{} should shrink", algorithm);
            }
        }
    }

    #[test]
    fn test_large_input_spans_chunks() {
        let data = sample().repeat(20);
        assert!(data.len() > CHUNK_SIZE * 2);
        let encoded = encode(CompressionAlgorithm::Zstd, 3, &data, None).unwrap();
        assert_eq!(decode(CompressionAlgorithm::Zstd, &encoded).unwrap(), data);
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let deadline = Instant::now() - Duration::from_millis(1);
        let result = encode(CompressionAlgorithm::Gzip, 6, &sample(), Some(deadline));
        assert!(matches!(result, Err(CodecError::Timeout)));
    }

    #[test]
    fn test_foreign_data_is_rejected() {
        let garbage = b"definitely not a compressed frame".to_vec();
        assert!(decode(CompressionAlgorithm::Gzip, &garbage).is_err());
        assert!(decode(CompressionAlgorithm::Zstd, &garbage).is_err());
        assert!(decode(CompressionAlgorithm::Lz4, &garbage).is_err());
    }
}
