//! Batch operation kinds and the per-row work each one does.

use crate::apply::{apply_decision, apply_registration};
use crate::cache::CatalogSnapshot;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use lineflow_db::{catalog, items, Item, Lot, LotType, NewItem};
use lineflow_intake::CanonicalRow;
use lineflow_lifecycle::{decide, decide_register, Actor, LifecycleError, Phase, Request, HAPPY_PATH};
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;
use tracing::debug;

/// What a reconcile run does to each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "phase", rename_all = "kebab-case")]
pub enum BatchOp {
    /// New item in REGISTRO; existing serials are skipped.
    Create,
    /// One step along the happy path.
    Advance,
    /// Administrative jump to a happy-path phase.
    SetPhase(Phase),
    /// Walk forward to EMPAQUE.
    Pack,
    /// Create the inbound serial, packing it when the line carries an
    /// outbound serial.
    Pair,
    /// Attach EMPAQUE items to a SALIDA lot.
    Ship,
}

impl BatchOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Advance => "advance",
            Self::SetPhase(_) => "set-phase",
            Self::Pack => "pack",
            Self::Pair => "pair",
            Self::Ship => "ship",
        }
    }

    /// `set-phase` needs `phase`; the other kinds ignore it.
    pub fn parse(name: &str, phase: Option<Phase>) -> Option<Self> {
        match name.trim().to_lowercase().replace('_', "-").as_str() {
            "create" => Some(Self::Create),
            "advance" => Some(Self::Advance),
            "set-phase" => phase.map(Self::SetPhase),
            "pack" => Some(Self::Pack),
            "pair" => Some(Self::Pair),
            "ship" => Some(Self::Ship),
            _ => None,
        }
    }

    /// Journal label, e.g. `set-phase:RETEST`.
    pub fn label(&self) -> String {
        match self {
            Self::SetPhase(phase) => format!("{}:{phase}", self.name()),
            other => other.name().to_string(),
        }
    }

    /// Lot type the run's rows attach to, if any.
    pub(crate) fn lot_type(&self) -> Option<LotType> {
        match self {
            Self::Create | Self::Pair => Some(LotType::Entrada),
            Self::Ship => Some(LotType::Salida),
            Self::Advance | Self::SetPhase(_) | Self::Pack => None,
        }
    }

    /// Runs that fill their lot close it afterwards.
    pub(crate) fn closes_lot(&self) -> bool {
        matches!(self, Self::Create | Self::Pair)
    }

    pub(crate) fn default_lot_number(&self, today: DateTime<Utc>) -> Option<String> {
        let stamp = today.format("%y%m%d");
        match self.lot_type()? {
            LotType::Entrada => Some(format!("LOT_{stamp}")),
            LotType::Salida => Some(format!("SAL_{stamp}")),
        }
    }

    /// Phases this run may write; each must resolve before any chunk starts.
    pub(crate) fn required_states(&self) -> Vec<Phase> {
        match self {
            Self::Create => vec![Phase::Registro],
            Self::Advance => HAPPY_PATH[1..].to_vec(),
            Self::SetPhase(phase) => vec![*phase],
            Self::Pack | Self::Pair => HAPPY_PATH.to_vec(),
            Self::Ship => vec![Phase::Empaque],
        }
    }
}

impl std::fmt::Display for BatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Shared, read-only inputs for every row of a run.
pub(crate) struct RowContext {
    pub op: BatchOp,
    pub actor: Actor,
    pub snapshot: Arc<CatalogSnapshot>,
    pub lot: Option<Lot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowOutcome {
    Accepted,
    Skipped,
}

/// Apply one row. Runs inside the row's savepoint.
pub(crate) async fn apply_row(
    conn: &mut SqliteConnection,
    ctx: &RowContext,
    row: &CanonicalRow,
) -> Result<RowOutcome> {
    match ctx.op {
        BatchOp::Create => Ok(outcome(create(conn, ctx, row).await?)),
        BatchOp::Advance => step(conn, ctx, &row.serial, Request::Advance).await,
        BatchOp::SetPhase(target) => step(conn, ctx, &row.serial, Request::SetPhase { target }).await,
        BatchOp::Pack => pack(conn, ctx, &row.serial, None).await,
        BatchOp::Pair => {
            let created = create(conn, ctx, row).await?;
            let packed = match &row.outbound_serial {
                Some(outbound) => {
                    let note = format!("salida {outbound}");
                    pack(conn, ctx, &row.serial, Some(note)).await? == RowOutcome::Accepted
                }
                None => false,
            };
            Ok(outcome(created || packed))
        }
        BatchOp::Ship => ship(conn, ctx, &row.serial).await,
    }
}

fn outcome(changed: bool) -> RowOutcome {
    if changed {
        RowOutcome::Accepted
    } else {
        RowOutcome::Skipped
    }
}

async fn load(conn: &mut SqliteConnection, serial: &str) -> Result<Item> {
    items::find_by_serial(conn, serial)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("item {serial}")))
}

/// Returns false when the serial already exists.
async fn create(conn: &mut SqliteConnection, ctx: &RowContext, row: &CanonicalRow) -> Result<bool> {
    if items::find_by_serial(conn, &row.serial).await?.is_some() {
        debug!(serial = %row.serial, "Already registered");
        return Ok(false);
    }
    let decision = decide_register(&ctx.actor, None)?;

    let lot_sku = ctx.lot.as_ref().and_then(|lot| lot.sku.clone());
    let sku = match (lot_sku, &row.material_code) {
        (Some(sku), _) => Some(sku),
        (None, Some(material)) => catalog::sku_for_material(conn, material).await?,
        (None, None) => None,
    };

    let new_item = NewItem {
        serial: row.serial.clone(),
        sku,
        material_code: row.material_code.clone(),
        batch_tag: row.batch_tag.clone(),
        state_id: ctx.snapshot.states.resolve(Phase::Registro)?,
        lot_id: ctx.lot.as_ref().map(|lot| lot.id),
        responsible_id: ctx.actor.user_id.clone(),
        received_at: row.received_at,
    };
    apply_registration(conn, &ctx.snapshot.states, new_item, &decision, &ctx.actor).await?;
    Ok(true)
}

/// A plain move; a request that changes nothing is a skip.
async fn step(
    conn: &mut SqliteConnection,
    ctx: &RowContext,
    serial: &str,
    request: Request,
) -> Result<RowOutcome> {
    let item = load(conn, serial).await?;
    let decided = decide(&item.state(), &ctx.actor, &request, &ctx.snapshot.codes);
    match decided {
        Ok(decision) => {
            apply_decision(conn, &ctx.snapshot.states, &item, &decision, &ctx.actor, None).await?;
            Ok(RowOutcome::Accepted)
        }
        Err(LifecycleError::NoChange(phase)) => {
            debug!(serial = %serial, phase = %phase, "Already in target phase");
            Ok(RowOutcome::Skipped)
        }
        Err(e) => Err(e.into()),
    }
}

/// Items parked in SCRAP or REPARACION are left alone.
async fn pack(
    conn: &mut SqliteConnection,
    ctx: &RowContext,
    serial: &str,
    note: Option<String>,
) -> Result<RowOutcome> {
    let item = load(conn, serial).await?;
    if matches!(item.phase, Phase::Scrap | Phase::Reparacion) {
        debug!(serial = %serial, phase = %item.phase, "Not packable, skipping");
        return Ok(RowOutcome::Skipped);
    }
    step(conn, ctx, serial, Request::Pack { note }).await
}

async fn ship(conn: &mut SqliteConnection, ctx: &RowContext, serial: &str) -> Result<RowOutcome> {
    let lot = ctx
        .lot
        .as_ref()
        .ok_or_else(|| EngineError::validation("shipping needs an outbound lot"))?;
    let item = load(conn, serial).await?;
    if item.outbound_lot_id == Some(lot.id) {
        return Ok(RowOutcome::Skipped);
    }
    let decision = decide(&item.state(), &ctx.actor, &Request::Ship, &ctx.snapshot.codes)?;
    apply_decision(conn, &ctx.snapshot.states, &item, &decision, &ctx.actor, Some(lot.id)).await?;
    Ok(RowOutcome::Accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_op_names() {
        assert_eq!(BatchOp::parse("create", None), Some(BatchOp::Create));
        assert_eq!(BatchOp::parse("SET_PHASE", Some(Phase::Retest)), Some(BatchOp::SetPhase(Phase::Retest)));
        assert_eq!(BatchOp::parse("set-phase", None), None);
        assert_eq!(BatchOp::parse("teleport", None), None);
    }

    #[test]
    fn test_default_lot_numbers() {
        let day = Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap();
        assert_eq!(BatchOp::Create.default_lot_number(day).as_deref(), Some("LOT_240105"));
        assert_eq!(BatchOp::Ship.default_lot_number(day).as_deref(), Some("SAL_240105"));
        assert_eq!(BatchOp::Advance.default_lot_number(day), None);
    }

    #[test]
    fn test_label() {
        assert_eq!(BatchOp::SetPhase(Phase::Ensamble).label(), "set-phase:ENSAMBLE");
        assert_eq!(BatchOp::Pair.to_string(), "pair");
    }
}
