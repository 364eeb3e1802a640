//! Writing an approved decision inside a caller's transaction.

use crate::cache::StateMap;
use crate::error::{EngineError, Result};
use lineflow_db::{items, records, Item, NewItem, NewRecord, PhaseChange};
use lineflow_lifecycle::{Actor, Decision, RecordDraft, ScrapChange, ScrapDetail, ScrapMotive};
use sqlx::sqlite::SqliteConnection;

/// Scrap fields the item carries after the decision.
fn scrap_fields(item: &Item, change: ScrapChange) -> (Option<ScrapMotive>, Option<ScrapDetail>) {
    match change {
        ScrapChange::Keep => (item.scrap_motive, item.scrap_detail),
        ScrapChange::Set { motive, detail } => (Some(motive), detail),
        ScrapChange::Detail(detail) => (item.scrap_motive, Some(detail)),
        ScrapChange::Clear => (None, None),
    }
}

fn new_record(
    item_id: i64,
    serial: &str,
    draft: &RecordDraft,
    states: &StateMap,
    actor: &Actor,
    lot_id: Option<i64>,
) -> Result<NewRecord> {
    Ok(NewRecord {
        item_id,
        serial: serial.to_string(),
        phase: draft.phase,
        previous_phase: draft.previous_phase,
        state_id: Some(states.resolve(draft.phase)?),
        disposition: draft.disposition.as_str().to_string(),
        scrap_motive: draft.scrap_motive,
        scrap_detail: draft.scrap_detail,
        diagnosis_code: draft.diagnosis_code.clone(),
        repair_code: draft.repair_code.clone(),
        technician: draft.technician.clone(),
        note: draft.note.clone(),
        user_id: actor.user_id.clone(),
        lot_id,
    })
}

/// Apply `decision` to `item`: optimistic phase update plus the records.
///
/// `outbound_lot_id` is required when the decision assigns one. Returns the
/// inserted record ids in order.
pub(crate) async fn apply_decision(
    conn: &mut SqliteConnection,
    states: &StateMap,
    item: &Item,
    decision: &Decision,
    actor: &Actor,
    outbound_lot_id: Option<i64>,
) -> Result<Vec<i64>> {
    if decision.assigns_outbound_lot && outbound_lot_id.is_none() {
        return Err(EngineError::validation(format!(
            "{} needs an outbound lot for this move",
            item.serial
        )));
    }

    let (scrap_motive, scrap_detail) = scrap_fields(item, decision.scrap);
    let change = PhaseChange {
        expected: item.phase,
        to: decision.to,
        state_id: states.resolve(decision.to)?,
        responsible_id: &actor.user_id,
        scrap_motive,
        scrap_detail,
        outbound_lot_id: if decision.assigns_outbound_lot { outbound_lot_id } else { None },
    };
    items::apply_phase_change(conn, item.id, &change).await?;

    let record_lot = if decision.assigns_outbound_lot {
        outbound_lot_id
    } else {
        item.lot_id
    };
    let mut ids = Vec::with_capacity(decision.records.len());
    for draft in &decision.records {
        let record = new_record(item.id, &item.serial, draft, states, actor, record_lot)?;
        ids.push(records::insert(conn, &record).await?);
    }
    Ok(ids)
}

/// Insert a new item in REGISTRO with its registration records.
pub(crate) async fn apply_registration(
    conn: &mut SqliteConnection,
    states: &StateMap,
    new_item: NewItem,
    decision: &Decision,
    actor: &Actor,
) -> Result<(Item, Vec<i64>)> {
    let item = items::insert(conn, &new_item).await?;
    let mut ids = Vec::with_capacity(decision.records.len());
    for draft in &decision.records {
        let record = new_record(item.id, &item.serial, draft, states, actor, item.lot_id)?;
        ids.push(records::insert(conn, &record).await?);
    }
    Ok((item, ids))
}
