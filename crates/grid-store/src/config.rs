//! Configuration for the grid store engines.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

use wx_common::{StoreError, StoreResult};

/// Upper bound on `fetch_window_secs` (ten years).
const MAX_FETCH_WINDOW_SECS: u64 = 10 * 366 * 86_400;

/// Tuning for fetch, put and clean fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridStoreConfig {
    /// Length of one fetch sub-window in seconds.
    pub fetch_window_secs: u64,

    /// Concurrent fetch workers. `None` runs one worker per sub-window.
    pub fetch_workers: Option<usize>,

    /// Concurrent put workers. `None` runs one worker per grid row.
    pub put_workers: Option<usize>,

    /// Concurrent clean workers across all projections.
    pub clean_workers: usize,

    /// Row keys per delete batch.
    pub delete_batch_size: usize,

    /// Zlib compression level (0-9).
    pub compression_level: u32,
}

impl Default for GridStoreConfig {
    fn default() -> Self {
        Self {
            fetch_window_secs: 3600,
            fetch_workers: None,
            put_workers: None,
            clean_workers: 16,
            delete_batch_size: 100,
            compression_level: 6,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.parse().ok())
}

impl GridStoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_parse("FETCH_WINDOW_SECS") {
            config.fetch_window_secs = secs;
        }

        if let Some(workers) = env_parse("FETCH_WORKERS") {
            config.fetch_workers = Some(workers);
        }

        if let Some(workers) = env_parse("PUT_WORKERS") {
            config.put_workers = Some(workers);
        }

        if let Some(workers) = env_parse("CLEAN_WORKERS") {
            config.clean_workers = workers;
        }

        if let Some(size) = env_parse("DELETE_BATCH_SIZE") {
            config.delete_batch_size = size;
        }

        if let Some(level) = env_parse("GRID_COMPRESSION_LEVEL") {
            config.compression_level = level;
        }

        config
    }

    /// Load configuration from a YAML file. Missing keys take defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        serde_yaml::from_str(&contents)
            .map_err(|e| StoreError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> StoreResult<()> {
        if self.fetch_window_secs == 0 {
            return Err(StoreError::Config("fetch_window_secs must be > 0".to_string()));
        }

        if self.fetch_window_secs > MAX_FETCH_WINDOW_SECS {
            return Err(StoreError::Config(format!(
                "fetch_window_secs must be <= {}",
                MAX_FETCH_WINDOW_SECS
            )));
        }

        if self.fetch_workers == Some(0) || self.put_workers == Some(0) {
            return Err(StoreError::Config("worker limits must be > 0".to_string()));
        }

        if self.clean_workers == 0 {
            return Err(StoreError::Config("clean_workers must be > 0".to_string()));
        }

        if self.delete_batch_size == 0 {
            return Err(StoreError::Config("delete_batch_size must be > 0".to_string()));
        }

        if self.compression_level > 9 {
            return Err(StoreError::Config("compression_level must be 0-9".to_string()));
        }

        Ok(())
    }

    /// Fetch sub-window length.
    pub fn fetch_window(&self) -> Duration {
        Duration::seconds(self.fetch_window_secs.min(MAX_FETCH_WINDOW_SECS) as i64)
    }
}
