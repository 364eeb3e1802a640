//! Scrap motives, scrap details and record dispositions.

use crate::text::fold_accents;
use serde::{Deserialize, Serialize};

/// Why an item was sent to scrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrapMotive {
    Cosmetica,
    FueraDeRango,
    Infestado,
    DefectoSw,
    SinReparacion,
    Otro,
}

impl ScrapMotive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosmetica => "COSMETICA",
            Self::FueraDeRango => "FUERA_DE_RANGO",
            Self::Infestado => "INFESTADO",
            Self::DefectoSw => "DEFECTO_SW",
            Self::SinReparacion => "SIN_REPARACION",
            Self::Otro => "OTRO",
        }
    }

    /// Exact parse of a stored label.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COSMETICA" => Some(Self::Cosmetica),
            "FUERA_DE_RANGO" => Some(Self::FueraDeRango),
            "INFESTADO" => Some(Self::Infestado),
            "DEFECTO_SW" => Some(Self::DefectoSw),
            "SIN_REPARACION" => Some(Self::SinReparacion),
            "OTRO" => Some(Self::Otro),
            _ => None,
        }
    }

    /// Map free-form operator input onto a motive.
    ///
    /// `ELECTRONICO` is an input alias for `FUERA_DE_RANGO`. Blank input is `None`.
    pub fn normalize(raw: &str) -> Option<Self> {
        let upper = fold_accents(raw).to_uppercase();
        if upper.is_empty() {
            return None;
        }
        let motive = if upper.contains("ELECTRONICO") || upper.contains("FUERA") || upper.contains("RANGO") {
            Self::FueraDeRango
        } else if upper.contains("COSME") {
            Self::Cosmetica
        } else if upper.contains("INFEST") {
            Self::Infestado
        } else if upper.contains("DEFECTO") || upper == "SW" || upper.contains("_SW") {
            Self::DefectoSw
        } else if upper.contains("SIN_REPARACION") || upper.contains("SIN REPARACION") {
            Self::SinReparacion
        } else {
            Self::Otro
        };
        Some(motive)
    }

    /// Electronic faults need a diagnosis code to back them.
    pub fn requires_diagnosis(&self) -> bool {
        matches!(self, Self::FueraDeRango)
    }

    /// Disposition written when a scrapped item leaves through a scrap lot.
    pub fn output_disposition(&self) -> Disposition {
        match self {
            Self::Cosmetica => Disposition::ScrapCosmetico,
            Self::FueraDeRango => Disposition::ScrapElectronico,
            Self::Infestado => Disposition::ScrapInfestacion,
            _ => Disposition::Scrap,
        }
    }
}

impl std::fmt::Display for ScrapMotive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Finer classification of a scrapped unit's physical condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrapDetail {
    CircuitoOkBaseNok,
    BaseOkCircuitoNok,
    CircuitoNokBaseNok,
    Infestacion,
    Otro,
}

impl ScrapDetail {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CircuitoOkBaseNok => "CIRCUITO_OK_BASE_NOK",
            Self::BaseOkCircuitoNok => "BASE_OK_CIRCUITO_NOK",
            Self::CircuitoNokBaseNok => "CIRCUITO_NOK_BASE_NOK",
            Self::Infestacion => "INFESTACION",
            Self::Otro => "OTRO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CIRCUITO_OK_BASE_NOK" => Some(Self::CircuitoOkBaseNok),
            "BASE_OK_CIRCUITO_NOK" => Some(Self::BaseOkCircuitoNok),
            "CIRCUITO_NOK_BASE_NOK" => Some(Self::CircuitoNokBaseNok),
            "INFESTACION" => Some(Self::Infestacion),
            "OTRO" => Some(Self::Otro),
            _ => None,
        }
    }

    /// Lenient parse of operator input; unknown text becomes `OTRO`.
    pub fn normalize(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase().replace(['-', ' '], "_");
        if let Some(detail) = Self::parse(&upper) {
            return detail;
        }
        if upper.contains("INFEST") {
            Self::Infestacion
        } else {
            Self::Otro
        }
    }
}

impl std::fmt::Display for ScrapDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resulting disposition stored on a transition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    SnOk,
    Scrap,
    Liberado,
    Reparacion,
    Diagnostico,
    Reparado,
    NoReparable,
    ReparacionExitosa,
    ReparacionFallida,
    Salida,
    ScrapCosmetico,
    ScrapElectronico,
    ScrapInfestacion,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SnOk => "SN_OK",
            Self::Scrap => "SCRAP",
            Self::Liberado => "LIBERADO",
            Self::Reparacion => "REPARACION",
            Self::Diagnostico => "DIAGNOSTICO",
            Self::Reparado => "REPARADO",
            Self::NoReparable => "NO_REPARABLE",
            Self::ReparacionExitosa => "REPARACION_EXITOSA",
            Self::ReparacionFallida => "REPARACION_FALLIDA",
            Self::Salida => "SALIDA",
            Self::ScrapCosmetico => "SCRAP_COSMETICO",
            Self::ScrapElectronico => "SCRAP_ELECTRONICO",
            Self::ScrapInfestacion => "SCRAP_INFESTACION",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_motive_aliases() {
        assert_eq!(ScrapMotive::normalize("electronico"), Some(ScrapMotive::FueraDeRango));
        assert_eq!(ScrapMotive::normalize("Fuera de rango"), Some(ScrapMotive::FueraDeRango));
        assert_eq!(ScrapMotive::normalize("cosmetico"), Some(ScrapMotive::Cosmetica));
        assert_eq!(ScrapMotive::normalize("INFESTADO"), Some(ScrapMotive::Infestado));
        assert_eq!(ScrapMotive::normalize("defecto_sw"), Some(ScrapMotive::DefectoSw));
        assert_eq!(ScrapMotive::normalize("SIN_REPARACION"), Some(ScrapMotive::SinReparacion));
        assert_eq!(ScrapMotive::normalize("golpe"), Some(ScrapMotive::Otro));
        assert_eq!(ScrapMotive::normalize("   "), None);
        assert_eq!(ScrapMotive::normalize("ELECTRÓNICO"), Some(ScrapMotive::FueraDeRango));
        assert_eq!(ScrapMotive::normalize("Cosmética"), Some(ScrapMotive::Cosmetica));
    }

    #[test]
    fn test_only_out_of_range_requires_diagnosis() {
        assert!(ScrapMotive::FueraDeRango.requires_diagnosis());
        assert!(!ScrapMotive::Cosmetica.requires_diagnosis());
        assert!(!ScrapMotive::Infestado.requires_diagnosis());
    }

    #[test]
    fn test_detail_normalize() {
        assert_eq!(ScrapDetail::normalize("circuito-nok base-nok"), ScrapDetail::CircuitoNokBaseNok);
        assert_eq!(ScrapDetail::normalize("infestado"), ScrapDetail::Infestacion);
        assert_eq!(ScrapDetail::normalize("???"), ScrapDetail::Otro);
    }

    #[test]
    fn test_output_disposition() {
        assert_eq!(ScrapMotive::Cosmetica.output_disposition(), Disposition::ScrapCosmetico);
        assert_eq!(ScrapMotive::FueraDeRango.output_disposition(), Disposition::ScrapElectronico);
        assert_eq!(ScrapMotive::Otro.output_disposition(), Disposition::Scrap);
    }
}
