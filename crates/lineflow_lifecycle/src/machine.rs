//! The single transition dispatcher.
//!
//! [`decide`] looks a request up in [`crate::rules::RULES`], checks phase,
//! role and required fields, and returns a [`Decision`] describing exactly
//! what the persistence layer must write. Nothing here performs I/O.

use crate::actor::Actor;
use crate::catalog::CodeLookup;
use crate::error::{LifecycleError, Result};
use crate::motive::{Disposition, ScrapDetail, ScrapMotive};
use crate::phase::Phase;
use crate::rules::{entry_rule, find_rule, Field, MoveKind, Rule, Target};
use crate::subflow::{self, DiagnosisRequest, RepairResolution, ScrapRequest};
use serde::{Deserialize, Serialize};

/// What the dispatcher needs to know about an existing item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemState {
    pub serial: String,
    pub phase: Phase,
    pub scrap_motive: Option<ScrapMotive>,
    pub scrap_detail: Option<ScrapDetail>,
}

/// A fully specified move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    Register,
    Advance,
    SetPhase { target: Phase },
    Pack { note: Option<String> },
    SendToScrap(ScrapRequest),
    ReleaseFromScrap { target: Phase, note: Option<String> },
    SendToRepair { note: Option<String> },
    Diagnose(DiagnosisRequest),
    ResolveRepair(RepairResolution),
    ScrapOutput { detail: ScrapDetail },
    Ship,
}

impl Request {
    pub fn kind(&self) -> MoveKind {
        match self {
            Self::Register => MoveKind::Register,
            Self::Advance => MoveKind::Advance,
            Self::SetPhase { .. } => MoveKind::SetPhase,
            Self::Pack { .. } => MoveKind::Pack,
            Self::SendToScrap(_) => MoveKind::SendToScrap,
            Self::ReleaseFromScrap { .. } => MoveKind::ReleaseFromScrap,
            Self::SendToRepair { .. } => MoveKind::SendToRepair,
            Self::Diagnose(d) if d.requires_repair => MoveKind::DiagnoseForRepair,
            Self::Diagnose(_) => MoveKind::Diagnose,
            Self::ResolveRepair(r) if r.success => MoveKind::RepairSucceeded,
            Self::ResolveRepair(_) => MoveKind::RepairFailed,
            Self::ScrapOutput { .. } => MoveKind::ScrapOutput,
            Self::Ship => MoveKind::Ship,
        }
    }

    fn requested_target(&self) -> Option<Phase> {
        match self {
            Self::SetPhase { target } | Self::ReleaseFromScrap { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Build a request from a target phase plus payload, as an interactive
    /// caller expresses it.
    pub fn infer(current: Phase, target: Phase, payload: Payload) -> Result<Request> {
        let mismatch = |what: &str| {
            LifecycleError::validation(format!("{what} payload cannot target {target}"))
        };
        match payload {
            Payload::Scrap(request) => {
                if target != Phase::Scrap {
                    return Err(mismatch("a scrap"));
                }
                Ok(Request::SendToScrap(request))
            }
            Payload::Diagnosis(request) => {
                let expected = if request.requires_repair {
                    Phase::Reparacion
                } else {
                    current
                };
                if target != expected {
                    return Err(mismatch("a diagnosis"));
                }
                Ok(Request::Diagnose(request))
            }
            Payload::Resolution(resolution) => {
                let expected = if resolution.success {
                    Phase::Ensamble
                } else {
                    Phase::Scrap
                };
                if target != expected {
                    return Err(mismatch("a repair resolution"));
                }
                Ok(Request::ResolveRepair(resolution))
            }
            Payload::None => plain_move(current, target, None),
            Payload::Note(note) => plain_move(current, target, Some(note)),
        }
    }
}

/// A move with no subflow payload, chosen by where the item is going.
fn plain_move(current: Phase, target: Phase, note: Option<String>) -> Result<Request> {
    match target {
        Phase::Scrap => Err(LifecycleError::validation("a scrap motive is required")),
        Phase::Reparacion => Ok(Request::SendToRepair { note }),
        _ if current == Phase::Scrap => Ok(Request::ReleaseFromScrap { target, note }),
        _ if current.next() == Some(target) => Ok(Request::Advance),
        _ => Ok(Request::SetPhase { target }),
    }
}

/// Extra data attached to an interactive transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    #[default]
    None,
    Note(String),
    Scrap(ScrapRequest),
    Diagnosis(DiagnosisRequest),
    Resolution(RepairResolution),
}

/// How the item's scrap fields change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapChange {
    Keep,
    Set {
        motive: ScrapMotive,
        detail: Option<ScrapDetail>,
    },
    Detail(ScrapDetail),
    Clear,
}

/// One transition record to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub phase: Phase,
    pub previous_phase: Option<Phase>,
    pub disposition: Disposition,
    pub scrap_motive: Option<ScrapMotive>,
    pub scrap_detail: Option<ScrapDetail>,
    pub diagnosis_code: Option<String>,
    pub repair_code: Option<String>,
    pub technician: Option<String>,
    pub note: Option<String>,
}

impl RecordDraft {
    fn new(phase: Phase, previous_phase: Option<Phase>, disposition: Disposition) -> Self {
        Self {
            phase,
            previous_phase,
            disposition,
            scrap_motive: None,
            scrap_detail: None,
            diagnosis_code: None,
            repair_code: None,
            technician: None,
            note: None,
        }
    }
}

/// The approved outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub kind: MoveKind,
    pub from: Option<Phase>,
    pub to: Phase,
    pub scrap: ScrapChange,
    /// The item must be attached to an outbound lot chosen by the caller.
    pub assigns_outbound_lot: bool,
    pub records: Vec<RecordDraft>,
}

impl Decision {
    pub fn changes_phase(&self) -> bool {
        self.from != Some(self.to)
    }
}

fn authorize(rule: &Rule, actor: &Actor) -> Result<()> {
    if actor.has_any(rule.roles) {
        Ok(())
    } else {
        Err(LifecycleError::PermissionDenied {
            role: actor.role.clone(),
            action: rule.kind.action(),
        })
    }
}

/// Approve creation of a new item in REGISTRO.
pub fn decide_register(actor: &Actor, note: Option<String>) -> Result<Decision> {
    let rule = entry_rule(MoveKind::Register).ok_or(LifecycleError::PhaseViolation {
        from: Phase::Registro,
        action: MoveKind::Register.action(),
    })?;
    authorize(rule, actor)?;
    let mut record = RecordDraft::new(Phase::Registro, None, Disposition::SnOk);
    record.note = note;
    Ok(Decision {
        kind: MoveKind::Register,
        from: None,
        to: Phase::Registro,
        scrap: ScrapChange::Keep,
        assigns_outbound_lot: false,
        records: vec![record],
    })
}

/// Approve or refuse a move for an existing item.
pub fn decide(
    item: &ItemState,
    actor: &Actor,
    request: &Request,
    codes: &dyn CodeLookup,
) -> Result<Decision> {
    let kind = request.kind();
    let from = item.phase;

    if let Some(no_change) = fixed_point(kind, from, request) {
        return Err(no_change);
    }

    let rule = find_rule(kind, from, item.scrap_motive).ok_or(LifecycleError::PhaseViolation {
        from,
        action: kind.action(),
    })?;
    authorize(rule, actor)?;

    let to = match rule.target {
        Target::Fixed(phase) => phase,
        Target::Stay => from,
        Target::Requested => request
            .requested_target()
            .ok_or_else(|| LifecycleError::validation("a target phase is required"))?,
    };
    check_fields(rule, item, to)?;

    build(item, actor, request, codes, kind, to)
}

/// Requests that would leave the item where it already is.
fn fixed_point(kind: MoveKind, from: Phase, request: &Request) -> Option<LifecycleError> {
    match kind {
        MoveKind::Advance | MoveKind::Pack if from == Phase::Empaque => {
            Some(LifecycleError::NoChange(from))
        }
        MoveKind::SetPhase if request.requested_target() == Some(from) => {
            Some(LifecycleError::NoChange(from))
        }
        _ => None,
    }
}

/// Field checks that depend only on the item and target. Catalog-backed
/// fields are checked while building the decision.
fn check_fields(rule: &Rule, item: &ItemState, to: Phase) -> Result<()> {
    for field in rule.required {
        match field {
            Field::HappyPathTarget if !to.is_happy_path() => {
                return Err(LifecycleError::validation(format!(
                    "{to} is not a valid target for this move"
                )));
            }
            Field::RecordedMotive if item.scrap_motive.is_none() => {
                return Err(LifecycleError::validation(format!(
                    "{} is in SCRAP without a recorded motive",
                    item.serial
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn build(
    item: &ItemState,
    actor: &Actor,
    request: &Request,
    codes: &dyn CodeLookup,
    kind: MoveKind,
    to: Phase,
) -> Result<Decision> {
    let from = item.phase;
    let mut decision = Decision {
        kind,
        from: Some(from),
        to,
        scrap: ScrapChange::Keep,
        assigns_outbound_lot: false,
        records: Vec::new(),
    };

    match request {
        Request::Register => {
            return Err(LifecycleError::NoChange(from));
        }
        Request::Advance | Request::SetPhase { .. } => {
            decision
                .records
                .push(RecordDraft::new(to, Some(from), Disposition::SnOk));
        }
        Request::Pack { note } => {
            let mut previous = from;
            while let Some(next) = previous.next() {
                decision
                    .records
                    .push(RecordDraft::new(next, Some(previous), Disposition::SnOk));
                previous = next;
            }
            if let Some(last) = decision.records.last_mut() {
                last.note = note.clone();
            }
        }
        Request::SendToScrap(scrap) => {
            let entry = subflow::scrap_entry(scrap, codes)?;
            let mut record = RecordDraft::new(Phase::Scrap, Some(from), Disposition::Scrap);
            record.scrap_motive = Some(entry.motive);
            record.scrap_detail = entry.detail;
            record.diagnosis_code = entry.diagnosis_code;
            record.note = scrap.note.clone();
            decision.records.push(record);
            decision.scrap = ScrapChange::Set {
                motive: entry.motive,
                detail: entry.detail,
            };
        }
        Request::ReleaseFromScrap { note, .. } => {
            let mut record = RecordDraft::new(to, Some(from), Disposition::Liberado);
            record.scrap_motive = item.scrap_motive;
            record.scrap_detail = item.scrap_detail;
            record.note = note.clone();
            decision.records.push(record);
            decision.scrap = ScrapChange::Clear;
        }
        Request::SendToRepair { note } => {
            let mut record = RecordDraft::new(Phase::Reparacion, Some(from), Disposition::Reparacion);
            record.scrap_motive = item.scrap_motive;
            record.note = note.clone();
            decision.records.push(record);
            decision.scrap = ScrapChange::Clear;
        }
        Request::Diagnose(diagnosis) => {
            let technician = if diagnosis.requires_repair {
                Some(subflow::technician(diagnosis.technician.as_deref())?)
            } else {
                diagnosis.technician.clone()
            };
            for code in subflow::diagnosis_codes(&diagnosis.codes, codes)? {
                let mut record = RecordDraft::new(to, Some(from), Disposition::Diagnostico);
                record.diagnosis_code = Some(code.code.clone());
                record.repair_code = code.repair_code.clone();
                record.technician = technician.clone();
                record.note = diagnosis.observations.clone();
                decision.records.push(record);
            }
        }
        Request::ResolveRepair(resolution) => {
            let technician = subflow::technician(resolution.technician.as_deref())?;
            let found = subflow::repair_codes(&resolution.codes, codes)?;
            if !resolution.success {
                subflow::require_scrap_tier(&found)?;
            }
            let per_code = if resolution.success {
                Disposition::Reparado
            } else {
                Disposition::NoReparable
            };
            for code in found {
                let mut record = RecordDraft::new(Phase::Reparacion, Some(from), per_code);
                record.repair_code = Some(code.code.clone());
                record.technician = Some(technician.clone());
                record.note = resolution.observations.clone();
                decision.records.push(record);
            }
            let mut closing = if resolution.success {
                RecordDraft::new(to, Some(from), Disposition::ReparacionExitosa)
            } else {
                let mut r = RecordDraft::new(to, Some(from), Disposition::ReparacionFallida);
                r.scrap_motive = Some(ScrapMotive::FueraDeRango);
                r.scrap_detail = Some(ScrapDetail::CircuitoNokBaseNok);
                decision.scrap = ScrapChange::Set {
                    motive: ScrapMotive::FueraDeRango,
                    detail: Some(ScrapDetail::CircuitoNokBaseNok),
                };
                r
            };
            closing.technician = Some(technician);
            closing.note = resolution.observations.clone();
            decision.records.push(closing);
        }
        Request::ScrapOutput { detail } => {
            let motive = item.scrap_motive.ok_or_else(|| {
                LifecycleError::validation(format!("{} has no scrap motive", item.serial))
            })?;
            let mut record = RecordDraft::new(Phase::Scrap, Some(from), motive.output_disposition());
            record.scrap_motive = Some(motive);
            record.scrap_detail = Some(*detail);
            decision.records.push(record);
            decision.scrap = ScrapChange::Detail(*detail);
            decision.assigns_outbound_lot = true;
        }
        Request::Ship => {
            decision
                .records
                .push(RecordDraft::new(Phase::Empaque, Some(from), Disposition::Salida));
            decision.assigns_outbound_lot = true;
        }
    }

    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CodeCatalog, DiagnosisCode, RepairCode, Severity};
    use crate::phase::HAPPY_PATH;
    use crate::rules::allowed_sources;

    fn codes() -> CodeCatalog {
        CodeCatalog::new(
            vec![DiagnosisCode {
                code: "D002".into(),
                description: "Sin señal óptica".into(),
                severity: Severity::Nivel1,
                repair_code: Some("N004".into()),
                active: true,
            }],
            vec![
                RepairCode {
                    code: "N003".into(),
                    description: "Resoldado".into(),
                    scrap_tier: false,
                    active: true,
                },
                RepairCode {
                    code: "SC1".into(),
                    description: "Tarjeta irreparable".into(),
                    scrap_tier: true,
                    active: true,
                },
            ],
        )
    }

    fn item(phase: Phase) -> ItemState {
        ItemState {
            serial: "ABC123456".into(),
            phase,
            scrap_motive: None,
            scrap_detail: None,
        }
    }

    fn scrapped(motive: ScrapMotive) -> ItemState {
        ItemState {
            scrap_motive: Some(motive),
            ..item(Phase::Scrap)
        }
    }

    #[test]
    fn test_advance_moves_exactly_one_step() {
        let admin = Actor::new("u1", "UA");
        for window in HAPPY_PATH.windows(2) {
            let decision = decide(&item(window[0]), &admin, &Request::Advance, &codes()).unwrap();
            assert_eq!(decision.to, window[1]);
            assert_eq!(decision.records.len(), 1);
        }
    }

    #[test]
    fn test_empaque_is_a_fixed_point() {
        let err = decide(&item(Phase::Empaque), &Actor::new("u1", "UA"), &Request::Advance, &codes())
            .unwrap_err();
        assert_eq!(err, LifecycleError::NoChange(Phase::Empaque));
    }

    #[test]
    fn test_advance_role_depends_on_target() {
        let tester = Actor::new("u1", "UTI");
        assert!(decide(&item(Phase::Registro), &tester, &Request::Advance, &codes()).is_ok());
        let err = decide(&item(Phase::TestInicial), &tester, &Request::Advance, &codes()).unwrap_err();
        assert!(matches!(err, LifecycleError::PermissionDenied { .. }));
    }

    #[test]
    fn test_accepted_iff_source_and_role_allowed() {
        let scrap = Request::SendToScrap(ScrapRequest {
            motive: "COSMETICA".into(),
            ..Default::default()
        });
        let sources = allowed_sources(MoveKind::SendToScrap);
        for phase in Phase::ALL {
            for role in ["UA", "UTI", "UReg", "URep", "UV"] {
                let actor = Actor::new("u1", role);
                let result = decide(&item(phase), &actor, &scrap, &codes());
                let allowed = sources.contains(&phase) && crate::actor::roles::SCRAP.contains(&role);
                assert_eq!(result.is_ok(), allowed, "phase={phase} role={role}");
            }
        }
    }

    #[test]
    fn test_scrap_then_release_clears_motive() {
        let tester = Actor::new("u1", "UTI");
        let scrap = Request::SendToScrap(ScrapRequest {
            motive: "cosmetica".into(),
            ..Default::default()
        });
        let decision = decide(&item(Phase::Retest), &tester, &scrap, &codes()).unwrap();
        assert_eq!(decision.to, Phase::Scrap);
        assert_eq!(decision.records[0].scrap_motive, Some(ScrapMotive::Cosmetica));

        let release = Request::ReleaseFromScrap {
            target: Phase::Retest,
            note: None,
        };
        let err = decide(&scrapped(ScrapMotive::Cosmetica), &tester, &release, &codes()).unwrap_err();
        assert!(matches!(err, LifecycleError::PermissionDenied { .. }));

        let repair = Actor::new("u2", "URep");
        let decision = decide(&scrapped(ScrapMotive::Cosmetica), &repair, &release, &codes()).unwrap();
        assert_eq!(decision.to, Phase::Retest);
        assert_eq!(decision.scrap, ScrapChange::Clear);
        assert_eq!(decision.records[0].disposition, Disposition::Liberado);
        assert_eq!(decision.records[0].scrap_motive, Some(ScrapMotive::Cosmetica));
    }

    #[test]
    fn test_release_target_must_be_happy_path() {
        let release = Request::ReleaseFromScrap {
            target: Phase::Reparacion,
            note: None,
        };
        let err = decide(&scrapped(ScrapMotive::Otro), &Actor::new("u", "URep"), &release, &codes())
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[test]
    fn test_diagnosis_for_repair_moves_to_reparacion() {
        let request = Request::Diagnose(DiagnosisRequest {
            codes: vec!["D002".into()],
            requires_repair: true,
            technician: Some("J.Perez".into()),
            observations: None,
        });
        let decision = decide(&item(Phase::Retest), &Actor::new("u", "URep"), &request, &codes()).unwrap();
        assert_eq!(decision.to, Phase::Reparacion);
        assert_eq!(decision.records.len(), 1);
        assert_eq!(decision.records[0].diagnosis_code.as_deref(), Some("D002"));
        assert_eq!(decision.records[0].repair_code.as_deref(), Some("N004"));
        assert_eq!(decision.records[0].technician.as_deref(), Some("J.Perez"));
    }

    #[test]
    fn test_diagnosis_for_repair_needs_technician() {
        let request = Request::Diagnose(DiagnosisRequest {
            codes: vec!["D002".into()],
            requires_repair: true,
            technician: None,
            observations: None,
        });
        let err = decide(&item(Phase::Retest), &Actor::new("u", "URep"), &request, &codes()).unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[test]
    fn test_successful_repair_emits_code_and_transition_records() {
        let request = Request::ResolveRepair(RepairResolution {
            success: true,
            codes: vec!["N003".into()],
            technician: Some("J.Perez".into()),
            observations: None,
        });
        let decision = decide(&item(Phase::Reparacion), &Actor::new("u", "URep"), &request, &codes()).unwrap();
        assert_eq!(decision.to, Phase::Ensamble);
        assert_eq!(decision.records.len(), 2);
        assert_eq!(decision.records[1].disposition, Disposition::ReparacionExitosa);
    }

    #[test]
    fn test_any_scrap_role_may_pick_electronic_motive() {
        let request = Request::SendToScrap(ScrapRequest {
            motive: "FUERA_DE_RANGO".into(),
            diagnosis_code: Some("D002".into()),
            ..Default::default()
        });
        for role in crate::actor::roles::SCRAP {
            let actor = Actor::new("u1", *role);
            let decision = decide(&item(Phase::Retest), &actor, &request, &codes()).unwrap();
            assert_eq!(decision.to, Phase::Scrap);
            assert_eq!(decision.records[0].diagnosis_code.as_deref(), Some("D002"));
        }
        let err = decide(&item(Phase::Retest), &Actor::new("u1", "UReg"), &request, &codes()).unwrap_err();
        assert!(matches!(err, LifecycleError::PermissionDenied { .. }));
    }

    #[test]
    fn test_failed_repair_requires_scrap_tier() {
        let actor = Actor::new("u", "URep");
        let failed = |code: &str| {
            Request::ResolveRepair(RepairResolution {
                success: false,
                codes: vec![code.into()],
                technician: Some("J.Perez".into()),
                observations: None,
            })
        };
        let decision = decide(&item(Phase::Reparacion), &actor, &failed("SC1"), &codes()).unwrap();
        assert_eq!(decision.to, Phase::Scrap);
        assert_eq!(
            decision.scrap,
            ScrapChange::Set {
                motive: ScrapMotive::FueraDeRango,
                detail: Some(ScrapDetail::CircuitoNokBaseNok),
            }
        );

        let err = decide(&item(Phase::Reparacion), &actor, &failed("N003"), &codes()).unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[test]
    fn test_pack_walks_remaining_steps() {
        let decision = decide(
            &item(Phase::TestInicial),
            &Actor::new("u", "UE"),
            &Request::Pack { note: Some("salida 123".into()) },
            &codes(),
        )
        .unwrap();
        let phases: Vec<Phase> = decision.records.iter().map(|r| r.phase).collect();
        assert_eq!(phases, vec![Phase::Ensamble, Phase::Retest, Phase::Empaque]);
        assert_eq!(decision.records[2].note.as_deref(), Some("salida 123"));
    }

    #[test]
    fn test_infer_from_target_and_payload() {
        assert_eq!(
            Request::infer(Phase::Ensamble, Phase::Retest, Payload::None).unwrap(),
            Request::Advance
        );
        assert_eq!(
            Request::infer(Phase::Scrap, Phase::Ensamble, Payload::None).unwrap(),
            Request::ReleaseFromScrap {
                target: Phase::Ensamble,
                note: None
            }
        );
        assert_eq!(
            Request::infer(Phase::Registro, Phase::Retest, Payload::None).unwrap(),
            Request::SetPhase { target: Phase::Retest }
        );
        assert!(Request::infer(Phase::Retest, Phase::Scrap, Payload::None).is_err());
        let resolution = Payload::Resolution(RepairResolution {
            success: true,
            ..Default::default()
        });
        assert!(Request::infer(Phase::Reparacion, Phase::Scrap, resolution).is_err());
    }

    #[test]
    fn test_register_requires_register_role() {
        assert!(decide_register(&Actor::new("u", "UReg"), None).is_ok());
        assert!(matches!(
            decide_register(&Actor::new("u", "UE"), None),
            Err(LifecycleError::PermissionDenied { .. })
        ));
    }
}
