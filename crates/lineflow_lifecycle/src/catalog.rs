//! Diagnosis and repair code catalogs.

use serde::{Deserialize, Serialize};

/// Severity tier of a diagnosis code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// No repair needed.
    Na,
    Nivel1,
    Nivel2,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Na => "NA",
            Self::Nivel1 => "NIVEL_1",
            Self::Nivel2 => "NIVEL_2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NA" => Some(Self::Na),
            "NIVEL_1" => Some(Self::Nivel1),
            "NIVEL_2" => Some(Self::Nivel2),
            _ => None,
        }
    }
}

/// Observed damage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisCode {
    pub code: String,
    pub description: String,
    pub severity: Severity,
    /// Canonical remediation for this damage, if any.
    pub repair_code: Option<String>,
    pub active: bool,
}

/// A remediation applied at the repair bench.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairCode {
    pub code: String,
    pub description: String,
    /// Applying this code means the unit cannot be recovered.
    pub scrap_tier: bool,
    pub active: bool,
}

/// Read access to the code catalogs.
pub trait CodeLookup {
    fn diagnosis(&self, code: &str) -> Option<&DiagnosisCode>;
    fn repair(&self, code: &str) -> Option<&RepairCode>;
}

/// In-memory catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct CodeCatalog {
    diagnosis: std::collections::HashMap<String, DiagnosisCode>,
    repair: std::collections::HashMap<String, RepairCode>,
}

impl CodeCatalog {
    pub fn new(diagnosis: Vec<DiagnosisCode>, repair: Vec<RepairCode>) -> Self {
        Self {
            diagnosis: diagnosis.into_iter().map(|c| (c.code.clone(), c)).collect(),
            repair: repair.into_iter().map(|c| (c.code.clone(), c)).collect(),
        }
    }

    pub fn diagnosis_count(&self) -> usize {
        self.diagnosis.len()
    }

    pub fn repair_count(&self) -> usize {
        self.repair.len()
    }
}

impl CodeLookup for CodeCatalog {
    fn diagnosis(&self, code: &str) -> Option<&DiagnosisCode> {
        self.diagnosis
            .get(code.trim().to_uppercase().as_str())
            .filter(|c| c.active)
    }

    fn repair(&self, code: &str) -> Option<&RepairCode> {
        self.repair
            .get(code.trim().to_uppercase().as_str())
            .filter(|c| c.active)
    }
}
