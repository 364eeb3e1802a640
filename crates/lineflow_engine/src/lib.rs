//! Orchestration for Lineflow.
//!
//! [`Engine`] ties the pure state machine in `lineflow_lifecycle` and the
//! batch parser in `lineflow_intake` to the store in `lineflow_db`:
//!
//! - [`Engine::transition`] applies one interactive move atomically.
//! - [`Engine::reconcile`] runs a whole batch file through the state machine
//!   in chunked transactions on a bounded worker pool.
//! - Lot, scrap-output and audit queries round out the surface.
//!
//! ```rust,ignore
//! let db = LineflowDb::open(path).await?;
//! let engine = Engine::new(db, EngineConfig::default());
//! let actor = Actor::new("u7", roles::ADMIN);
//! let result = engine
//!     .reconcile(&text, BatchOp::Create, &actor, LotOptions::default(), &CancellationToken::new())
//!     .await?;
//! ```

mod apply;
pub mod cache;
mod cancel;
mod config;
mod error;
mod ops;
mod queries;
mod reconcile;
mod scrap_output;
mod transition;

pub use cache::{CatalogCache, CatalogSnapshot, StateMap};
pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind, Result};
pub use ops::BatchOp;
pub use reconcile::{BatchResult, LotOptions, RowError};
pub use scrap_output::ScrapOutputOutcome;
pub use transition::TransitionOutcome;

use lineflow_db::LineflowDb;
use std::sync::Arc;

/// Entry point for every item operation. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    db: LineflowDb,
    catalog: Arc<CatalogCache>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(db: LineflowDb, config: EngineConfig) -> Self {
        let catalog = Arc::new(CatalogCache::new(config.catalog_ttl()));
        Self::with_cache(db, config, catalog)
    }

    /// Share a catalog cache between engines, or inject a fresh one.
    ///
    /// `max_workers` is capped at the pool's connection limit.
    pub fn with_cache(db: LineflowDb, config: EngineConfig, catalog: Arc<CatalogCache>) -> Self {
        let config = config.fit_to_pool(db.max_connections());
        Self { db, catalog, config }
    }

    pub fn db(&self) -> &LineflowDb {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogCache {
        &self.catalog
    }

    /// Seed the default catalogs and drop the cached snapshot.
    pub async fn seed(&self) -> Result<lineflow_db::SeedSummary> {
        let summary = self.db.seed_catalogs().await?;
        self.catalog.invalidate();
        Ok(summary)
    }
}
