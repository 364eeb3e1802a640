//! Interactive single-item transitions.

use crate::apply::apply_decision;
use crate::error::{EngineError, Result};
use crate::Engine;
use lineflow_db::{items, records, Item, TransitionRecord};
use lineflow_lifecycle::{decide, Actor, Payload, Phase, Request};
use serde::Serialize;
use tracing::info;

/// The item after the move and the records it produced.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub item: Item,
    pub records: Vec<TransitionRecord>,
}

impl Engine {
    /// Move one item to `target`. Atomic: the phase update and every record
    /// commit together or not at all.
    pub async fn transition(
        &self,
        serial: &str,
        target: Phase,
        actor: &Actor,
        payload: Payload,
    ) -> Result<TransitionOutcome> {
        let serial = serial.trim().to_uppercase();
        let snapshot = self.catalog.snapshot(&self.db).await?;

        let mut tx = self.db.pool().begin().await?;
        let item = items::find_by_serial(&mut tx, &serial)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("item {serial}")))?;

        let request = Request::infer(item.phase, target, payload)?;
        let decision = decide(&item.state(), actor, &request, &snapshot.codes)?;
        let ids = apply_decision(&mut tx, &snapshot.states, &item, &decision, actor, None).await?;

        let updated = items::find_by_serial(&mut tx, &serial)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("item {serial}")))?;
        let records = records::fetch_by_ids(&mut tx, &ids).await?;
        tx.commit().await?;

        info!(
            serial = %serial,
            from = %item.phase,
            to = %updated.phase,
            kind = ?decision.kind,
            records = records.len(),
            user = %actor.user_id,
            "Transition applied"
        );

        Ok(TransitionOutcome {
            item: updated,
            records,
        })
    }
}
