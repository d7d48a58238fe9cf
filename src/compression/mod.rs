//! Event payload compression
//!
//! - `Compressor`: serializes records to JSON and frames them with one of
//!   `none`, `gzip`, `brotli`, `lz4` or `zstd`
//! - batch compression on a rayon pool, one result per input in input order
//! - cooperative timeouts: encoders are fed 64 KiB at a time and the
//!   deadline is checked between chunks
//!
//! The archiver is the main consumer; it stores each record's compressed
//! bytes together with the algorithm tag so items decode independently.

mod codec;
mod compressor;

pub use compressor::Compressor;
