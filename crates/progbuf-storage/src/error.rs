#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used by `progbuf-storage`.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by byte caches.
///
/// Higher-level crates wrap this error to add element context.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid range: start {start} >= end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("range {start}..{end} not available yet")]
    Unavailable { start: u64, end: u64 },

    #[error("cache capacity of {capacity} bytes exceeded")]
    CapacityExceeded { capacity: u64 },
}
