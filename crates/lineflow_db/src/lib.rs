//! Persistence layer for Lineflow.
//!
//! SQLite via sqlx. Read helpers hang off [`LineflowDb`]; writes that must
//! share a caller's transaction are free functions in the domain modules
//! taking `&mut SqliteConnection`, so the engine can compose them inside
//! one chunk transaction.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lineflow_db::{LineflowDb, Result};
//!
//! let db = LineflowDb::open("~/.lineflow/lineflow.sqlite3").await?;
//! db.seed_catalogs().await?;
//!
//! let mut tx = db.pool().begin().await?;
//! let item = lineflow_db::items::find_by_serial(&mut tx, "ABC123456").await?;
//! tx.commit().await?;
//! ```

mod error;
mod schema;
mod seed;
mod types;

pub mod catalog;
pub mod items;
pub mod lots;
pub mod records;
pub mod runs;

pub use error::{DbError, Result};
pub use types::*;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Connection settings.
#[derive(Debug, Clone)]
pub struct DbOptions {
    pub max_connections: u32,
    /// How long a writer waits for the lock before failing.
    pub busy_timeout: Duration,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            max_connections: 8,
            busy_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle to the Lineflow database. Cheap to clone.
#[derive(Clone)]
pub struct LineflowDb {
    pool: SqlitePool,
}

impl LineflowDb {
    /// Open or create a database at the given path with default options.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, DbOptions::default()).await
    }

    /// Open or create a database at the given path.
    ///
    /// Creates all tables if they don't exist.
    pub async fn open_with(path: impl AsRef<Path>, options: DbOptions) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Per-connection pragmas belong on the connect options so every
        // pooled connection gets them.
        let connect = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(options.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections.max(1))
            .connect_with(connect)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;

        info!(path = %path.display(), "Database opened");

        Ok(db)
    }

    /// Open an existing database (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbError::NotFound(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        Self::open(path).await
    }

    /// Get the underlying connection pool, used to open transactions.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upper bound on concurrent connections, and so on concurrent writers.
    pub fn max_connections(&self) -> u32 {
        self.pool.options().get_max_connections()
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

// Timestamp utilities
impl LineflowDb {
    /// Current time as milliseconds since Unix epoch.
    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Convert milliseconds to DateTime.
    pub fn millis_to_datetime(millis: i64) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(millis).unwrap_or_else(chrono::Utc::now)
    }
}

pub(crate) fn parse_phase(raw: &str) -> Result<lineflow_lifecycle::Phase> {
    lineflow_lifecycle::Phase::parse(raw)
        .ok_or_else(|| DbError::invalid_state(format!("unknown phase '{raw}'")))
}

pub(crate) fn parse_motive(raw: Option<String>) -> Result<Option<lineflow_lifecycle::ScrapMotive>> {
    raw.map(|m| {
        lineflow_lifecycle::ScrapMotive::parse(&m)
            .ok_or_else(|| DbError::invalid_state(format!("unknown scrap motive '{m}'")))
    })
    .transpose()
}

pub(crate) fn parse_detail(raw: Option<String>) -> Result<Option<lineflow_lifecycle::ScrapDetail>> {
    raw.map(|d| {
        lineflow_lifecycle::ScrapDetail::parse(&d)
            .ok_or_else(|| DbError::invalid_state(format!("unknown scrap detail '{d}'")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("test.db");

        let db = LineflowDb::open(&db_path).await.unwrap();
        assert!(db_path.exists());

        db.close().await;
    }

    #[tokio::test]
    async fn test_open_existing_fails_if_not_exists() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nonexistent.db");

        let result = LineflowDb::open_existing(&db_path).await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }
}
