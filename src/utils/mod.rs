//! Utility functions and helpers
//!
//! Atomic file writes, cancellation, and time and size helpers.

pub mod atomic;
pub mod cancel;
pub mod time;

pub use atomic::{atomic_write, atomic_write_with, cleanup_temp_files};
pub use cancel::CancelFlag;
pub use time::{bytes_to_mb, days_between, elapsed_ms, format_size};
