//! Transition command - move one item
//!
//! The kind of move follows from the flags: `--motive` scraps, `--diagnose`
//! records a diagnosis, `--repair` closes a repair, anything else is a
//! plain move to `--to`.

use crate::cli::context::GlobalArgs;
use crate::cli::error::{helpful, HelpfulError};
use crate::cli::output::{format_time, or_dash, print_json, print_table};
use lineflow_db::TransitionRecord;
use lineflow_lifecycle::{DiagnosisRequest, Payload, Phase, RepairResolution, ScrapDetail, ScrapRequest};

#[derive(Debug)]
pub struct TransitionArgs {
    pub serial: String,
    pub to: Phase,
    pub motive: Option<String>,
    pub detail: Option<String>,
    pub diagnosis_code: Option<String>,
    pub diagnose: Vec<String>,
    pub repair: Vec<String>,
    pub technician: Option<String>,
    pub note: Option<String>,
    pub json: bool,
}

/// Build the payload the flags describe. At most one subflow may be named.
pub fn build_payload(args: &TransitionArgs) -> anyhow::Result<Payload> {
    let named = [args.motive.is_some(), !args.diagnose.is_empty(), !args.repair.is_empty()]
        .iter()
        .filter(|&&set| set)
        .count();
    if named > 1 {
        return Err(HelpfulError::new("Conflicting flags")
            .with_context("--motive, --diagnose and --repair each describe a different move")
            .with_suggestion("TRY: Pass only one of them")
            .into());
    }

    if let Some(motive) = &args.motive {
        return Ok(Payload::Scrap(ScrapRequest {
            motive: motive.clone(),
            detail: args.detail.as_deref().map(ScrapDetail::normalize),
            diagnosis_code: args.diagnosis_code.clone(),
            note: args.note.clone(),
        }));
    }
    if !args.diagnose.is_empty() {
        return Ok(Payload::Diagnosis(DiagnosisRequest {
            codes: args.diagnose.clone(),
            requires_repair: args.to == Phase::Reparacion,
            technician: args.technician.clone(),
            observations: args.note.clone(),
        }));
    }
    if !args.repair.is_empty() {
        return Ok(Payload::Resolution(RepairResolution {
            success: args.to != Phase::Scrap,
            codes: args.repair.clone(),
            technician: args.technician.clone(),
            observations: args.note.clone(),
        }));
    }
    Ok(match &args.note {
        Some(note) => Payload::Note(note.clone()),
        None => Payload::None,
    })
}

pub fn run(global: GlobalArgs, args: TransitionArgs) -> anyhow::Result<()> {
    let actor = global.actor()?;
    let payload = build_payload(&args)?;

    let rt = crate::cli::runtime()?;
    let outcome = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(engine.transition(&args.serial, args.to, &actor, payload).await)
    })?;

    if args.json {
        return print_json(&outcome);
    }
    println!("{} is now in {}", outcome.item.serial, outcome.item.phase);
    print_records(&outcome.records);
    Ok(())
}

pub fn print_records(records: &[TransitionRecord]) {
    print_table(
        &["WHEN", "SERIAL", "FROM", "TO", "DISPOSITION", "MOTIVE", "DIAG", "REPAIR", "USER", "NOTE"],
        records
            .iter()
            .map(|r| {
                vec![
                    format_time(r.created_at),
                    r.serial.clone(),
                    or_dash(r.previous_phase),
                    r.phase.to_string(),
                    r.disposition.clone(),
                    or_dash(r.scrap_motive),
                    or_dash(r.diagnosis_code.as_deref()),
                    or_dash(r.repair_code.as_deref()),
                    r.user_id.clone(),
                    or_dash(r.note.as_deref()),
                ]
            })
            .collect(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(to: Phase) -> TransitionArgs {
        TransitionArgs {
            serial: "ABC123456".into(),
            to,
            motive: None,
            detail: None,
            diagnosis_code: None,
            diagnose: Vec::new(),
            repair: Vec::new(),
            technician: None,
            note: None,
            json: false,
        }
    }

    #[test]
    fn test_plain_move() {
        assert_eq!(build_payload(&args(Phase::Ensamble)).unwrap(), Payload::None);
    }

    #[test]
    fn test_failed_repair_targets_scrap() {
        let mut a = args(Phase::Scrap);
        a.repair = vec!["SC1".into()];
        a.technician = Some("J.Perez".into());
        match build_payload(&a).unwrap() {
            Payload::Resolution(r) => assert!(!r.success),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_diagnosis_into_repair() {
        let mut a = args(Phase::Reparacion);
        a.diagnose = vec!["D002".into()];
        match build_payload(&a).unwrap() {
            Payload::Diagnosis(d) => assert!(d.requires_repair),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_conflicting_subflows() {
        let mut a = args(Phase::Scrap);
        a.motive = Some("COSMETICA".into());
        a.repair = vec!["SC1".into()];
        assert!(build_payload(&a).is_err());
    }
}
