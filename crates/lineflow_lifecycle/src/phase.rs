//! Pipeline phases.

use serde::{Deserialize, Serialize};

/// The stage an item currently occupies.
///
/// The happy path is `REGISTRO → TEST_INICIAL → ENSAMBLE → RETEST → EMPAQUE`.
/// `SCRAP` and `REPARACION` are side states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Registro,
    TestInicial,
    Ensamble,
    Retest,
    Empaque,
    Scrap,
    Reparacion,
}

/// Linear happy path, in order.
pub const HAPPY_PATH: [Phase; 5] = [
    Phase::Registro,
    Phase::TestInicial,
    Phase::Ensamble,
    Phase::Retest,
    Phase::Empaque,
];

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Registro,
        Phase::TestInicial,
        Phase::Ensamble,
        Phase::Retest,
        Phase::Empaque,
        Phase::Scrap,
        Phase::Reparacion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registro => "REGISTRO",
            Self::TestInicial => "TEST_INICIAL",
            Self::Ensamble => "ENSAMBLE",
            Self::Retest => "RETEST",
            Self::Empaque => "EMPAQUE",
            Self::Scrap => "SCRAP",
            Self::Reparacion => "REPARACION",
        }
    }

    /// Parse a phase label. Accepts any case and `-`/space in place of `_`.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "REGISTRO" => Some(Self::Registro),
            "TEST_INICIAL" => Some(Self::TestInicial),
            "ENSAMBLE" => Some(Self::Ensamble),
            "RETEST" => Some(Self::Retest),
            "EMPAQUE" => Some(Self::Empaque),
            "SCRAP" => Some(Self::Scrap),
            "REPARACION" => Some(Self::Reparacion),
            _ => None,
        }
    }

    pub fn is_happy_path(&self) -> bool {
        self.position().is_some()
    }

    /// Index along the happy path, `None` for side states.
    pub fn position(&self) -> Option<usize> {
        HAPPY_PATH.iter().position(|p| p == self)
    }

    /// Next phase along the happy path. `EMPAQUE` and the side states have none.
    pub fn next(&self) -> Option<Phase> {
        self.position().and_then(|i| HAPPY_PATH.get(i + 1).copied())
    }

    /// Catalog labels to try, in order, when resolving this phase's state row.
    pub fn state_fallbacks(&self) -> &'static [Phase] {
        match self {
            Self::Registro | Self::TestInicial | Self::Ensamble | Self::Empaque => {
                &[Phase::Retest]
            }
            Self::Retest | Self::Scrap | Self::Reparacion => &[],
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_walks_happy_path() {
        assert_eq!(Phase::Registro.next(), Some(Phase::TestInicial));
        assert_eq!(Phase::Retest.next(), Some(Phase::Empaque));
        assert_eq!(Phase::Empaque.next(), None);
        assert_eq!(Phase::Scrap.next(), None);
        assert_eq!(Phase::Reparacion.next(), None);
    }

    #[test]
    fn test_parse_is_lenient() {
        assert_eq!(Phase::parse("test-inicial"), Some(Phase::TestInicial));
        assert_eq!(Phase::parse(" empaque "), Some(Phase::Empaque));
        assert_eq!(Phase::parse("bodega"), None);
        for phase in Phase::ALL {
            assert_eq!(Phase::parse(phase.as_str()), Some(phase));
        }
    }

    #[test]
    fn test_serde_uses_catalog_labels() {
        let json = serde_json::to_string(&Phase::TestInicial).unwrap();
        assert_eq!(json, "\"TEST_INICIAL\"");
    }

    #[test]
    fn test_fallbacks_end_at_retest() {
        assert_eq!(Phase::Ensamble.state_fallbacks(), &[Phase::Retest]);
        assert!(Phase::Retest.state_fallbacks().is_empty());
        assert!(Phase::Scrap.state_fallbacks().is_empty());
    }
}
