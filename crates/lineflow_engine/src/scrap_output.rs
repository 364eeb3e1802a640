//! Shipping scrapped items out in per-motive scrap lots.

use crate::apply::apply_decision;
use crate::error::{EngineError, Result};
use crate::Engine;
use chrono::Utc;
use lineflow_db::{items, lots, records, Item, Lot, LotStatus, LotType, NewLot, TransitionRecord, DEFAULT_LOT_PRIORITY};
use lineflow_lifecycle::{decide, Actor, Request, ScrapDetail, ScrapMotive};
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct ScrapOutputOutcome {
    pub item: Item,
    pub lot: Lot,
    pub records: Vec<TransitionRecord>,
}

/// `SCR{YYYY}{MM}-{MOTIVE}`; the store appends `-NNNN`.
fn scrap_lot_prefix(motive: ScrapMotive) -> String {
    format!("SCR{}-{}", Utc::now().format("%Y%m"), motive.as_str())
}

/// The lot a scrapped item ships in: the named one if given, else the open
/// lot for (SKU, user, motive), else a new one.
async fn target_lot(
    conn: &mut SqliteConnection,
    item: &Item,
    motive: ScrapMotive,
    lot_number: Option<&str>,
    actor: &Actor,
) -> Result<Lot> {
    if let Some(number) = lot_number {
        let lot = lots::find_by_number(conn, number)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("lot {number}")))?;
        if !lot.is_scrap || lot.lot_type != LotType::Salida {
            return Err(EngineError::validation(format!("lot {number} is not a scrap output lot")));
        }
        if lot.status != LotStatus::EnProceso {
            return Err(EngineError::validation(format!("lot {number} is already {}", lot.status)));
        }
        if lot.scrap_motive != Some(motive) {
            return Err(EngineError::validation(format!(
                "{} has motive {motive} but lot {number} holds {}",
                item.serial,
                lot.scrap_motive.map(|m| m.as_str()).unwrap_or("no motive")
            )));
        }
        return Ok(lot);
    }

    if let Some(open) = lots::find_open_scrap_lot(conn, item.sku.as_deref(), &actor.user_id, motive).await? {
        return Ok(open);
    }

    let number = lots::next_sequenced_number(conn, &scrap_lot_prefix(motive)).await?;
    let lot = lots::upsert(
        conn,
        &NewLot {
            number,
            sku: item.sku.clone(),
            lot_type: LotType::Salida,
            is_scrap: true,
            scrap_motive: Some(motive),
            priority: DEFAULT_LOT_PRIORITY,
            responsible_id: Some(actor.user_id.clone()),
        },
    )
    .await?;
    Ok(lot)
}

impl Engine {
    /// Put a SCRAP item into an outbound scrap lot and record its detail.
    pub async fn register_scrap_output(
        &self,
        serial: &str,
        detail: ScrapDetail,
        lot_number: Option<&str>,
        actor: &Actor,
    ) -> Result<ScrapOutputOutcome> {
        let serial = serial.trim().to_uppercase();
        let snapshot = self.catalog.snapshot(&self.db).await?;

        let mut tx = self.db.pool().begin().await?;
        let item = items::find_by_serial(&mut tx, &serial)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("item {serial}")))?;
        if let Some(lot_id) = item.outbound_lot_id {
            return Err(EngineError::validation(format!(
                "{serial} already left in outbound lot {lot_id}"
            )));
        }

        let decision = decide(&item.state(), actor, &Request::ScrapOutput { detail }, &snapshot.codes)?;
        let motive = item
            .scrap_motive
            .ok_or_else(|| EngineError::validation(format!("{serial} has no scrap motive")))?;

        let lot = target_lot(&mut tx, &item, motive, lot_number, actor).await?;
        let ids = apply_decision(&mut tx, &snapshot.states, &item, &decision, actor, Some(lot.id)).await?;

        let updated = items::find_by_serial(&mut tx, &serial)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("item {serial}")))?;
        let records = records::fetch_by_ids(&mut tx, &ids).await?;
        tx.commit().await?;

        info!(serial = %serial, lot = %lot.number, motive = %motive, "Scrap output registered");

        Ok(ScrapOutputOutcome {
            item: updated,
            lot,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrap_lot_prefix_shape() {
        let prefix = scrap_lot_prefix(ScrapMotive::Cosmetica);
        assert!(prefix.starts_with("SCR"));
        assert!(prefix.ends_with("-COSMETICA"));
        assert_eq!(prefix.len(), "SCR202601-COSMETICA".len());
    }
}
