//! Persisted entities.

use chrono::{DateTime, Utc};
use lineflow_lifecycle::{ItemState, Phase, ScrapDetail, ScrapMotive};
use serde::{Deserialize, Serialize};

// ============================================================================
// Items
// ============================================================================

/// One physical unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub serial: String,
    pub sku: Option<String>,
    pub material_code: Option<String>,
    pub batch_tag: Option<String>,
    pub phase: Phase,
    pub state_id: Option<i64>,
    pub lot_id: Option<i64>,
    pub responsible_id: Option<String>,
    pub scrap_motive: Option<ScrapMotive>,
    pub scrap_detail: Option<ScrapDetail>,
    pub outbound_lot_id: Option<i64>,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Item {
    /// The view the state machine decides on.
    pub fn state(&self) -> ItemState {
        ItemState {
            serial: self.serial.clone(),
            phase: self.phase,
            scrap_motive: self.scrap_motive,
            scrap_detail: self.scrap_detail,
        }
    }
}

/// Fields for a newly registered item. Items always start in REGISTRO.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub serial: String,
    pub sku: Option<String>,
    pub material_code: Option<String>,
    pub batch_tag: Option<String>,
    pub state_id: i64,
    pub lot_id: Option<i64>,
    pub responsible_id: String,
    pub received_at: DateTime<Utc>,
}

/// New values written by an approved transition.
#[derive(Debug, Clone)]
pub struct PhaseChange<'a> {
    pub expected: Phase,
    pub to: Phase,
    pub state_id: i64,
    pub responsible_id: &'a str,
    pub scrap_motive: Option<ScrapMotive>,
    pub scrap_detail: Option<ScrapDetail>,
    /// Replaces the outbound lot when set; keeps it otherwise.
    pub outbound_lot_id: Option<i64>,
}

/// Filter for listing items.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub phase: Option<Phase>,
    pub lot_number: Option<String>,
    pub sku: Option<String>,
    pub scrap_motive: Option<ScrapMotive>,
    pub include_deleted: bool,
    pub limit: Option<u32>,
}

impl ItemFilter {
    pub fn phase(phase: Phase) -> Self {
        Self {
            phase: Some(phase),
            ..Self::default()
        }
    }
}

// ============================================================================
// Lots
// ============================================================================

/// Direction of a lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotType {
    Entrada,
    Salida,
}

impl LotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entrada => "ENTRADA",
            Self::Salida => "SALIDA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ENTRADA" => Some(Self::Entrada),
            "SALIDA" => Some(Self::Salida),
            _ => None,
        }
    }
}

impl std::fmt::Display for LotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotStatus {
    EnProceso,
    Completado,
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnProceso => "EN_PROCESO",
            Self::Completado => "COMPLETADO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EN_PROCESO" => Some(Self::EnProceso),
            "COMPLETADO" => Some(Self::Completado),
            _ => None,
        }
    }
}

impl std::fmt::Display for LotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A batch of items entering or leaving together.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub id: i64,
    pub number: String,
    pub sku: Option<String>,
    pub lot_type: LotType,
    pub is_scrap: bool,
    /// Fixed at creation for scrap lots.
    pub scrap_motive: Option<ScrapMotive>,
    pub status: LotStatus,
    pub priority: i64,
    pub responsible_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewLot {
    pub number: String,
    pub sku: Option<String>,
    pub lot_type: LotType,
    pub is_scrap: bool,
    pub scrap_motive: Option<ScrapMotive>,
    /// 1 (low) to 3 (high).
    pub priority: i64,
    pub responsible_id: Option<String>,
}

/// Default lot priority.
pub const DEFAULT_LOT_PRIORITY: i64 = 2;

// ============================================================================
// Transition records
// ============================================================================

/// Append-only audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub id: i64,
    pub item_id: i64,
    pub serial: String,
    pub phase: Phase,
    pub previous_phase: Option<Phase>,
    pub state_id: Option<i64>,
    pub disposition: String,
    pub scrap_motive: Option<ScrapMotive>,
    pub scrap_detail: Option<ScrapDetail>,
    pub diagnosis_code: Option<String>,
    pub repair_code: Option<String>,
    pub technician: Option<String>,
    pub note: Option<String>,
    pub user_id: String,
    pub lot_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecord {
    pub item_id: i64,
    pub serial: String,
    pub phase: Phase,
    pub previous_phase: Option<Phase>,
    pub state_id: Option<i64>,
    pub disposition: String,
    pub scrap_motive: Option<ScrapMotive>,
    pub scrap_detail: Option<ScrapDetail>,
    pub diagnosis_code: Option<String>,
    pub repair_code: Option<String>,
    pub technician: Option<String>,
    pub note: Option<String>,
    pub user_id: String,
    pub lot_id: Option<i64>,
}

/// Filter for reading the audit log.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub serial: Option<String>,
    pub phase: Option<Phase>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Only records carrying a diagnosis or repair code.
    pub codes_only: bool,
    pub limit: Option<u32>,
}

// ============================================================================
// Catalogs
// ============================================================================

/// Phase label backed by a state row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub id: i64,
    pub name: String,
}

/// Counts returned by catalog seeding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub states: u64,
    pub diagnosis_codes: u64,
    pub repair_codes: u64,
    pub skus: u64,
}

/// SCRAP inventory breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapStats {
    pub total: u64,
    pub by_motive: Vec<(String, u64)>,
    pub by_detail: Vec<(String, u64)>,
    pub by_sku: Vec<(String, u64)>,
}

// ============================================================================
// Reconcile runs
// ============================================================================

/// Journal entry for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRun {
    pub id: i64,
    pub operation: String,
    pub source_name: Option<String>,
    pub user_id: String,
    pub accepted: u64,
    pub skipped: u64,
    pub failed: u64,
    pub unmatched: u64,
    pub chunks_started: u64,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Final counts written when a run ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTotals {
    pub accepted: u64,
    pub skipped: u64,
    pub failed: u64,
    pub unmatched: u64,
    pub cancelled: bool,
}
