//! Read-side queries and lot administration.

use crate::error::{EngineError, Result};
use crate::Engine;
use lineflow_db::lots::PurgeSummary;
use lineflow_db::{DbError, Item, ItemFilter, Lot, ReconcileRun, RecordFilter, ScrapStats, TransitionRecord};
use lineflow_lifecycle::Phase;
use tracing::info;

impl Engine {
    /// Live items in `phase`, narrowed by the rest of `filter`.
    pub async fn list_by_phase(&self, phase: Phase, filter: ItemFilter) -> Result<Vec<Item>> {
        let filter = ItemFilter {
            phase: Some(phase),
            ..filter
        };
        Ok(self.db.list_items(&filter).await?)
    }

    /// The audit log by serial, phase and date range.
    pub async fn history(&self, filter: &RecordFilter) -> Result<Vec<TransitionRecord>> {
        Ok(self.db.records(filter).await?)
    }

    pub async fn repair_history(&self, serial: &str) -> Result<Vec<TransitionRecord>> {
        Ok(self.db.repair_history(serial.trim()).await?)
    }

    /// Items waiting in REPARACION, oldest first.
    pub async fn pending_repairs(&self) -> Result<Vec<Item>> {
        Ok(self.db.pending_repairs().await?)
    }

    pub async fn scrap_stats(&self) -> Result<ScrapStats> {
        Ok(self.db.scrap_stats().await?)
    }

    pub async fn list_lots(&self, limit: Option<u32>) -> Result<Vec<Lot>> {
        Ok(self.db.list_lots(limit).await?)
    }

    /// Mark a lot COMPLETADO. Empty or already closed lots are refused.
    pub async fn close_lot(&self, number: &str) -> Result<Lot> {
        match self.db.close_lot(number.trim()).await {
            Ok(lot) => Ok(lot),
            Err(DbError::InvalidState(msg)) => Err(EngineError::Validation(msg)),
            Err(e) => Err(e.into()),
        }
    }

    /// Tombstone a lot and its items. `confirmation` must repeat the number.
    pub async fn purge_lot(&self, number: &str, confirmation: &str) -> Result<PurgeSummary> {
        let number = number.trim();
        if confirmation.trim() != number {
            return Err(EngineError::validation(format!(
                "confirmation '{confirmation}' does not match lot number '{number}'"
            )));
        }
        let summary = self.db.purge_lot(number, confirmation).await?;
        info!(lot = %summary.lot_number, items = summary.items_tombstoned, "Purge complete");
        Ok(summary)
    }

    pub async fn recent_runs(&self, limit: u32) -> Result<Vec<ReconcileRun>> {
        Ok(self.db.list_runs(limit).await?)
    }
}
