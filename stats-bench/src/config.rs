//! Configuration for the in-process stats stress harness.

use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration.
#[derive(Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub allocator: AllocatorConfig,
}

/// General run settings.
#[derive(Deserialize)]
pub struct GeneralConfig {
    /// How long to run the workload.
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,
    /// Number of worker threads.
    pub threads: usize,
}

/// Logging settings.
#[derive(Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "stats=debug").
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "compact", "json", or "pretty".
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

/// Workload shape.
#[derive(Deserialize)]
pub struct WorkloadConfig {
    /// Vocabulary size per name position.
    pub tokens: usize,
    /// Tokens per generated name.
    pub depth: usize,
    /// Upper bound on live encoded names per worker.
    pub live_limit: usize,
    /// Percentage of operations that touch a counter through the store
    /// instead of encoding/freeing a name (0-100).
    pub counter_ratio: u8,
}

/// Record store settings.
#[derive(Deserialize)]
pub struct AllocatorConfig {
    /// Storage backend for stat records.
    #[serde(default)]
    pub backend: AllocatorBackend,
    /// Block capacity (block backend only).
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    /// Block slot count (block backend only). Should be a prime larger
    /// than the capacity.
    #[serde(default = "default_num_slots")]
    pub num_slots: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            backend: AllocatorBackend::default(),
            capacity: default_capacity(),
            num_slots: default_num_slots(),
        }
    }
}

fn default_capacity() -> u32 {
    16384
}

fn default_num_slots() -> u32 {
    16411
}

/// Record store backend.
#[derive(Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AllocatorBackend {
    #[default]
    Heap,
    Block,
}

impl std::fmt::Display for AllocatorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocatorBackend::Heap => write!(f, "heap"),
            AllocatorBackend::Block => write!(f, "block"),
        }
    }
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        if config.general.threads == 0 {
            return Err("general.threads must be at least 1".into());
        }
        if config.workload.tokens == 0 || config.workload.depth == 0 {
            return Err("workload.tokens and workload.depth must be at least 1".into());
        }
        if config.workload.counter_ratio > 100 {
            return Err(format!(
                "workload.counter_ratio must be 0-100 (got {})",
                config.workload.counter_ratio
            )
            .into());
        }

        Ok(config)
    }
}

/// Deserialize a duration from a human-readable string (e.g., "60s", "5m").
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}
