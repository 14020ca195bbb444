//! Error types for the recoverable stats failures.
//!
//! Invariant violations (name-length overruns on the heap path, symbol
//! overflow, decode inconsistencies) are panics, not errors: the symbol
//! table is process-critical state and partial recovery is deliberately
//! not attempted.

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// The record store has no free slots left.
    #[error("stat allocator exhausted")]
    AllocatorFull,

    /// A metric name was requested with a different kind than it was
    /// first registered with.
    #[error("metric '{0}' already registered with a different kind")]
    KindMismatch(String),

    /// The provided block is smaller than `num_bytes` requires.
    #[error("stats block too small: need {needed} bytes, have {actual}")]
    BlockTooSmall { needed: usize, actual: usize },

    /// An `init=false` attach found a header that disagrees with the
    /// configured options.
    #[error(
        "stats block header mismatch: capacity {found_capacity} (expected {expected_capacity}), \
         slots {found_slots} (expected {expected_slots})"
    )]
    BlockMismatch {
        expected_capacity: u32,
        found_capacity: u32,
        expected_slots: u32,
        found_slots: u32,
    },

    /// An `init=false` attach found internally inconsistent metadata.
    #[error("stats block corrupt: {0}")]
    BlockCorrupt(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
