//! Lifecycle state machine for Lineflow items.
//!
//! Pure decision logic: given an item's current phase, the acting user's
//! role and the requested move, decide whether the move is legal and what
//! it writes. Persistence lives in `lineflow_db`; orchestration in
//! `lineflow_engine`.

pub mod actor;
pub mod catalog;
mod error;
pub mod machine;
pub mod motive;
pub mod phase;
pub mod rules;
pub mod subflow;
pub mod text;

pub use actor::{roles, Actor};
pub use catalog::{CodeCatalog, CodeLookup, DiagnosisCode, RepairCode, Severity};
pub use error::{LifecycleError, Result};
pub use machine::{decide, decide_register, Decision, ItemState, Payload, RecordDraft, Request, ScrapChange};
pub use motive::{Disposition, ScrapDetail, ScrapMotive};
pub use phase::{Phase, HAPPY_PATH};
pub use rules::MoveKind;
pub use subflow::{DiagnosisRequest, RepairResolution, ScrapRequest};
pub use text::fold_accents;
