//! The transition table.
//!
//! Every move the pipeline knows about is one or more rows here, keyed by
//! move kind and source phase. The dispatcher in [`crate::machine`] is the
//! only consumer.

use crate::actor::roles;
use crate::motive::ScrapMotive;
use crate::phase::{Phase, HAPPY_PATH};
use serde::{Deserialize, Serialize};

/// Every kind of move an item can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Register,
    Advance,
    SetPhase,
    Pack,
    SendToScrap,
    ReleaseFromScrap,
    SendToRepair,
    Diagnose,
    DiagnoseForRepair,
    RepairSucceeded,
    RepairFailed,
    ScrapOutput,
    Ship,
}

impl MoveKind {
    /// Verb phrase used in error messages.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Advance => "advance",
            Self::SetPhase => "set the phase of",
            Self::Pack => "pack",
            Self::SendToScrap => "scrap",
            Self::ReleaseFromScrap => "release from scrap",
            Self::SendToRepair => "send to repair",
            Self::Diagnose => "diagnose",
            Self::DiagnoseForRepair => "diagnose for repair",
            Self::RepairSucceeded => "close a successful repair on",
            Self::RepairFailed => "close a failed repair on",
            Self::ScrapOutput => "ship scrap for",
            Self::Ship => "ship",
        }
    }
}

/// Where a rule leaves the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Fixed(Phase),
    /// Phase chosen by the caller, constrained to the happy path.
    Requested,
    /// Phase does not change.
    Stay,
}

/// Extra condition on the source item beyond its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    None,
    ScrapMotive(ScrapMotive),
}

/// Fields a request must carry for a rule to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// A recognizable scrap motive.
    Motive,
    /// A valid diagnosis code when the motive is electronic.
    MotiveDiagnosis,
    /// A requested target on the happy path.
    HappyPathTarget,
    /// At least one valid diagnosis code.
    DiagnosisCodes,
    /// A responsible technician.
    Technician,
    /// At least one valid repair code.
    RepairCodes,
    /// At least one scrap-tier repair code.
    ScrapTierCode,
    /// The item already carries a scrap motive.
    RecordedMotive,
}

/// One row of the table.
#[derive(Debug)]
pub struct Rule {
    pub kind: MoveKind,
    pub sources: &'static [Phase],
    pub guard: Guard,
    pub target: Target,
    pub roles: &'static [&'static str],
    pub required: &'static [Field],
}

const WORK_PHASES: &[Phase] = &[Phase::TestInicial, Phase::Ensamble, Phase::Retest];
const DIAGNOSIS_PHASES: &[Phase] = &[
    Phase::TestInicial,
    Phase::Ensamble,
    Phase::Retest,
    Phase::Reparacion,
];
const PACKABLE: &[Phase] = &[
    Phase::Registro,
    Phase::TestInicial,
    Phase::Ensamble,
    Phase::Retest,
];

pub static RULES: &[Rule] = &[
    Rule {
        kind: MoveKind::Register,
        sources: &[],
        guard: Guard::None,
        target: Target::Fixed(Phase::Registro),
        roles: roles::REGISTER,
        required: &[],
    },
    Rule {
        kind: MoveKind::Advance,
        sources: &[Phase::Registro],
        guard: Guard::None,
        target: Target::Fixed(Phase::TestInicial),
        roles: roles::ADVANCE_TO_TEST_INICIAL,
        required: &[],
    },
    Rule {
        kind: MoveKind::Advance,
        sources: &[Phase::TestInicial],
        guard: Guard::None,
        target: Target::Fixed(Phase::Ensamble),
        roles: roles::ADVANCE_TO_ENSAMBLE,
        required: &[],
    },
    Rule {
        kind: MoveKind::Advance,
        sources: &[Phase::Ensamble],
        guard: Guard::None,
        target: Target::Fixed(Phase::Retest),
        roles: roles::ADVANCE_TO_RETEST,
        required: &[],
    },
    Rule {
        kind: MoveKind::Advance,
        sources: &[Phase::Retest],
        guard: Guard::None,
        target: Target::Fixed(Phase::Empaque),
        roles: roles::ADVANCE_TO_EMPAQUE,
        required: &[],
    },
    Rule {
        kind: MoveKind::SetPhase,
        sources: &HAPPY_PATH,
        guard: Guard::None,
        target: Target::Requested,
        roles: roles::SET_PHASE,
        required: &[Field::HappyPathTarget],
    },
    Rule {
        kind: MoveKind::Pack,
        sources: PACKABLE,
        guard: Guard::None,
        target: Target::Fixed(Phase::Empaque),
        roles: roles::PACK,
        required: &[],
    },
    Rule {
        kind: MoveKind::SendToScrap,
        sources: WORK_PHASES,
        guard: Guard::None,
        target: Target::Fixed(Phase::Scrap),
        roles: roles::SCRAP,
        required: &[Field::Motive, Field::MotiveDiagnosis],
    },
    Rule {
        kind: MoveKind::ReleaseFromScrap,
        sources: &[Phase::Scrap],
        guard: Guard::None,
        target: Target::Requested,
        roles: roles::RELEASE,
        required: &[Field::HappyPathTarget],
    },
    Rule {
        kind: MoveKind::SendToRepair,
        sources: WORK_PHASES,
        guard: Guard::None,
        target: Target::Fixed(Phase::Reparacion),
        roles: roles::REPAIR,
        required: &[],
    },
    Rule {
        kind: MoveKind::SendToRepair,
        sources: &[Phase::Scrap],
        guard: Guard::ScrapMotive(ScrapMotive::FueraDeRango),
        target: Target::Fixed(Phase::Reparacion),
        roles: roles::REPAIR,
        required: &[],
    },
    Rule {
        kind: MoveKind::Diagnose,
        sources: DIAGNOSIS_PHASES,
        guard: Guard::None,
        target: Target::Stay,
        roles: roles::REPAIR,
        required: &[Field::DiagnosisCodes],
    },
    Rule {
        kind: MoveKind::DiagnoseForRepair,
        sources: DIAGNOSIS_PHASES,
        guard: Guard::None,
        target: Target::Fixed(Phase::Reparacion),
        roles: roles::REPAIR,
        required: &[Field::DiagnosisCodes, Field::Technician],
    },
    Rule {
        kind: MoveKind::RepairSucceeded,
        sources: &[Phase::Reparacion],
        guard: Guard::None,
        target: Target::Fixed(Phase::Ensamble),
        roles: roles::REPAIR,
        required: &[Field::Technician, Field::RepairCodes],
    },
    Rule {
        kind: MoveKind::RepairFailed,
        sources: &[Phase::Reparacion],
        guard: Guard::None,
        target: Target::Fixed(Phase::Scrap),
        roles: roles::REPAIR,
        required: &[Field::Technician, Field::RepairCodes, Field::ScrapTierCode],
    },
    Rule {
        kind: MoveKind::ScrapOutput,
        sources: &[Phase::Scrap],
        guard: Guard::None,
        target: Target::Stay,
        roles: roles::SCRAP_OUTPUT,
        required: &[Field::RecordedMotive],
    },
    Rule {
        kind: MoveKind::Ship,
        sources: &[Phase::Empaque],
        guard: Guard::None,
        target: Target::Stay,
        roles: roles::SHIP,
        required: &[],
    },
];

/// Find the rule for `kind` whose sources and guard admit the item.
pub fn find_rule(kind: MoveKind, from: Phase, motive: Option<ScrapMotive>) -> Option<&'static Rule> {
    RULES.iter().find(|rule| {
        rule.kind == kind
            && rule.sources.contains(&from)
            && match rule.guard {
                Guard::None => true,
                Guard::ScrapMotive(required) => motive == Some(required),
            }
    })
}

/// The rule for a move with no source item.
pub fn entry_rule(kind: MoveKind) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.kind == kind && rule.sources.is_empty())
}

/// Every phase the table lets `kind` start from.
pub fn allowed_sources(kind: MoveKind) -> Vec<Phase> {
    let mut phases: Vec<Phase> = RULES
        .iter()
        .filter(|r| r.kind == kind)
        .flat_map(|r| r.sources.iter().copied())
        .collect();
    phases.sort();
    phases.dedup();
    phases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_advance_row_moves_one_step() {
        for rule in RULES.iter().filter(|r| r.kind == MoveKind::Advance) {
            let [source] = rule.sources else {
                panic!("advance rows have a single source");
            };
            assert_eq!(rule.target, Target::Fixed(source.next().unwrap()));
        }
    }

    #[test]
    fn test_scrap_to_repair_requires_out_of_range_motive() {
        assert!(find_rule(MoveKind::SendToRepair, Phase::Scrap, Some(ScrapMotive::FueraDeRango)).is_some());
        assert!(find_rule(MoveKind::SendToRepair, Phase::Scrap, Some(ScrapMotive::Cosmetica)).is_none());
        assert!(find_rule(MoveKind::SendToRepair, Phase::Scrap, None).is_none());
    }

    #[test]
    fn test_empaque_is_not_an_advance_source() {
        assert!(find_rule(MoveKind::Advance, Phase::Empaque, None).is_none());
        assert!(!allowed_sources(MoveKind::Advance).contains(&Phase::Empaque));
    }

    #[test]
    fn test_release_only_from_scrap() {
        assert_eq!(allowed_sources(MoveKind::ReleaseFromScrap), vec![Phase::Scrap]);
    }

    #[test]
    fn test_register_is_an_entry_rule() {
        assert!(entry_rule(MoveKind::Register).is_some());
        assert!(entry_rule(MoveKind::Advance).is_none());
    }
}
