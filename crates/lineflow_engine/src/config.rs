//! Engine tuning knobs, read from the `[engine]` table of `config.toml`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

fn default_chunk_size() -> usize {
    200
}

fn default_max_workers() -> usize {
    4
}

fn default_chunk_timeout_secs() -> u64 {
    120
}

fn default_catalog_ttl_secs() -> u64 {
    3600
}

fn default_error_sample_limit() -> usize {
    20
}

fn default_min_serial_len() -> usize {
    lineflow_intake::DEFAULT_MIN_SERIAL_LEN
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rows per chunk transaction.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chunks in flight at once.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_chunk_timeout_secs")]
    pub chunk_timeout_secs: u64,

    /// How long state and code catalogs stay cached.
    #[serde(default = "default_catalog_ttl_secs")]
    pub catalog_ttl_secs: u64,

    /// Row errors kept in a batch result.
    #[serde(default = "default_error_sample_limit")]
    pub error_sample_limit: usize,

    #[serde(default = "default_min_serial_len")]
    pub min_serial_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_workers: default_max_workers(),
            chunk_timeout_secs: default_chunk_timeout_secs(),
            catalog_ttl_secs: default_catalog_ttl_secs(),
            error_sample_limit: default_error_sample_limit(),
            min_serial_len: default_min_serial_len(),
        }
    }
}

impl EngineConfig {
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs.max(1))
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    /// Values clamped to something the engine can run with.
    pub(crate) fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    pub(crate) fn effective_workers(&self) -> usize {
        self.max_workers.max(1)
    }

    /// Cap `max_workers` at the pool size. Every in-flight chunk holds one
    /// connection for its whole transaction.
    pub fn fit_to_pool(mut self, max_connections: u32) -> Self {
        let pool = (max_connections as usize).max(1);
        if self.max_workers > pool {
            warn!(
                max_workers = self.max_workers,
                max_connections = pool,
                "max_workers exceeds the connection pool; clamping"
            );
            self.max_workers = pool;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size, 200);
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.chunk_timeout(), Duration::from_secs(120));
        assert_eq!(config.min_serial_len, 6);
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let config = EngineConfig {
            chunk_size: 0,
            max_workers: 0,
            chunk_timeout_secs: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.effective_chunk_size(), 1);
        assert_eq!(config.effective_workers(), 1);
        assert_eq!(config.chunk_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_workers_fit_to_pool() {
        let config = EngineConfig {
            max_workers: 32,
            ..EngineConfig::default()
        };
        assert_eq!(config.clone().fit_to_pool(8).max_workers, 8);
        assert_eq!(config.fit_to_pool(0).max_workers, 1);
        assert_eq!(EngineConfig::default().fit_to_pool(8).max_workers, 4);
    }
}
