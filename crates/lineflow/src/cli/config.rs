//! Configuration for Lineflow
//!
//! `~/.lineflow/config.toml` (or `$LINEFLOW_HOME/config.toml`). Every field
//! has a default, and a missing file means all defaults.

use anyhow::Context;
use lineflow_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Defaults to `~/.lineflow/lineflow.sqlite3`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineflowConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl LineflowConfig {
    /// Read `path`, or return defaults if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Database path: explicit flag, then the file, then the home default.
    pub fn database_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.database.path.clone())
            .unwrap_or_else(lineflow_logging::default_db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = LineflowConfig::load(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config, LineflowConfig::default());
        assert_eq!(config.engine.chunk_size, 200);
    }

    #[test]
    fn test_partial_engine_table() {
        let config = LineflowConfig::parse(
            r#"
            [database]
            path = "/data/lineflow.sqlite3"

            [engine]
            chunk_size = 50
            max_workers = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.chunk_size, 50);
        assert_eq!(config.engine.max_workers, 2);
        assert_eq!(config.engine.chunk_timeout_secs, 120);
        assert_eq!(
            config.database_path(None),
            PathBuf::from("/data/lineflow.sqlite3")
        );
        assert_eq!(
            config.database_path(Some(Path::new("other.sqlite3"))),
            PathBuf::from("other.sqlite3")
        );
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(LineflowConfig::parse("[engine]\nchunk_size = \"big\"\n").is_err());
    }
}
