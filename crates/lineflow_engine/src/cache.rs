//! Process-wide catalog snapshot with a TTL.
//!
//! The cache is an explicit object owned by the engine; tests build their
//! own instead of sharing a global.

use crate::error::{EngineError, Result};
use lineflow_db::LineflowDb;
use lineflow_lifecycle::{CodeCatalog, Phase};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Phase label to state id, with fallback substitution.
#[derive(Debug, Clone, Default)]
pub struct StateMap {
    ids: HashMap<Phase, i64>,
}

impl StateMap {
    pub fn new(entries: impl IntoIterator<Item = (Phase, i64)>) -> Self {
        Self {
            ids: entries.into_iter().collect(),
        }
    }

    /// State id for `phase`, or for the first fallback that has one.
    pub fn resolve(&self, phase: Phase) -> Result<i64> {
        std::iter::once(&phase)
            .chain(phase.state_fallbacks())
            .find_map(|p| self.ids.get(p).copied())
            .ok_or(EngineError::CatalogIncomplete(phase))
    }

    /// Fail fast when any of `phases` cannot be resolved.
    pub fn require(&self, phases: &[Phase]) -> Result<()> {
        for phase in phases {
            self.resolve(*phase)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Everything a decision needs from the catalogs.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub states: StateMap,
    pub codes: CodeCatalog,
}

struct Cached {
    snapshot: Arc<CatalogSnapshot>,
    loaded_at: Instant,
}

pub struct CatalogCache {
    ttl: Duration,
    slot: RwLock<Option<Cached>>,
}

impl CatalogCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Current snapshot, reloading from the store when stale.
    pub async fn snapshot(&self, db: &LineflowDb) -> Result<Arc<CatalogSnapshot>> {
        if let Some(fresh) = self.fresh() {
            return Ok(fresh);
        }

        let snapshot = Arc::new(load(db).await?);
        debug!(
            states = snapshot.states.len(),
            diagnosis_codes = snapshot.codes.diagnosis_count(),
            repair_codes = snapshot.codes.repair_count(),
            "Catalog cache refreshed"
        );
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some(Cached {
                snapshot: Arc::clone(&snapshot),
                loaded_at: Instant::now(),
            });
        }
        Ok(snapshot)
    }

    /// Drop the cached snapshot; the next read reloads.
    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = None;
        }
    }

    fn fresh(&self) -> Option<Arc<CatalogSnapshot>> {
        let slot = self.slot.read().ok()?;
        let cached = slot.as_ref()?;
        (cached.loaded_at.elapsed() < self.ttl).then(|| Arc::clone(&cached.snapshot))
    }
}

async fn load(db: &LineflowDb) -> Result<CatalogSnapshot> {
    let states = db
        .list_states()
        .await?
        .into_iter()
        .filter_map(|entry| Phase::parse(&entry.name).map(|phase| (phase, entry.id)));
    Ok(CatalogSnapshot {
        states: StateMap::new(states),
        codes: db.code_catalog().await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_with_fallback() {
        let states = StateMap::new([(Phase::Retest, 4), (Phase::Scrap, 6)]);
        assert_eq!(states.resolve(Phase::Retest).unwrap(), 4);
        assert_eq!(states.resolve(Phase::Ensamble).unwrap(), 4);
        assert_eq!(states.resolve(Phase::Scrap).unwrap(), 6);
        assert!(matches!(
            states.resolve(Phase::Reparacion),
            Err(EngineError::CatalogIncomplete(Phase::Reparacion))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_is_cached_until_invalidated() {
        let tmp = TempDir::new().unwrap();
        let db = LineflowDb::open(tmp.path().join("cache.db")).await.unwrap();
        let cache = CatalogCache::new(Duration::from_secs(3600));

        let empty = cache.snapshot(&db).await.unwrap();
        assert!(empty.states.is_empty());

        db.seed_catalogs().await.unwrap();
        let still_cached = cache.snapshot(&db).await.unwrap();
        assert!(still_cached.states.is_empty());

        cache.invalidate();
        let reloaded = cache.snapshot(&db).await.unwrap();
        assert_eq!(reloaded.states.len(), 7);
        assert_eq!(reloaded.codes.repair_count(), 19);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_reloads() {
        let tmp = TempDir::new().unwrap();
        let db = LineflowDb::open(tmp.path().join("cache.db")).await.unwrap();
        let cache = CatalogCache::new(Duration::ZERO);

        assert!(cache.snapshot(&db).await.unwrap().states.is_empty());
        db.seed_catalogs().await.unwrap();
        assert_eq!(cache.snapshot(&db).await.unwrap().states.len(), 7);
    }
}
