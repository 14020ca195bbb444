//! Configuration types for the stats subsystem.

/// Default bound on a full stat name, scope prefix included.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 127;

/// Default bound on the trailing portion of a name after a scope prefix.
pub const DEFAULT_MAX_STAT_SUFFIX_LENGTH: usize = 67;

/// Table-wide sizing knobs shared by both allocator variants. The name
/// bound fixes the canonical record size, so every record in a store has
/// the same byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsOptions {
    /// Longest permissible full stat name. Longer names are rejected by
    /// the heap allocator and truncated by the block allocator.
    pub max_name_length: usize,
    /// Longest permissible trailing portion after a scope prefix.
    pub max_stat_suffix_length: usize,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_stat_suffix_length: DEFAULT_MAX_STAT_SUFFIX_LENGTH,
        }
    }
}

impl StatsOptions {
    /// Whether `suffix` fits under a scope prefix.
    pub fn suffix_fits(&self, suffix: &str) -> bool {
        suffix.len() <= self.max_stat_suffix_length
    }
}

/// Sizing for the block-backed record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockOptions {
    /// Maximum number of live records.
    pub capacity: u32,
    /// Hash table slot count. Should be a prime comfortably larger than
    /// `capacity` times the target load factor.
    pub num_slots: u32,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            capacity: 16384,
            num_slots: 16411, // prime > capacity
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = StatsOptions::default();
        assert_eq!(options.max_name_length, 127);
        assert_eq!(options.max_stat_suffix_length, 67);
        assert!(options.suffix_fits("upstream_rq_2xx"));
        assert!(!options.suffix_fits(&"x".repeat(68)));
    }

    #[test]
    fn test_block_defaults() {
        let options = BlockOptions::default();
        assert!(options.num_slots > options.capacity);
    }
}
