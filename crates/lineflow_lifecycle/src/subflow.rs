//! Scrap and repair validation.
//!
//! These checks back the `required` fields of the transition table and
//! build the per-code record fan-out for diagnosis and repair resolution.

use crate::catalog::{CodeLookup, DiagnosisCode, RepairCode};
use crate::error::{LifecycleError, Result};
use crate::motive::{ScrapDetail, ScrapMotive};
use serde::{Deserialize, Serialize};

/// Payload for sending an item to scrap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapRequest {
    /// Free-form motive, normalized with [`ScrapMotive::normalize`].
    pub motive: String,
    pub detail: Option<ScrapDetail>,
    pub diagnosis_code: Option<String>,
    pub note: Option<String>,
}

/// Payload for recording a diagnosis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisRequest {
    pub codes: Vec<String>,
    pub requires_repair: bool,
    pub technician: Option<String>,
    pub observations: Option<String>,
}

/// Payload for closing out a repair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairResolution {
    pub success: bool,
    pub codes: Vec<String>,
    pub technician: Option<String>,
    pub observations: Option<String>,
}

/// Validated scrap entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapEntry {
    pub motive: ScrapMotive,
    pub detail: Option<ScrapDetail>,
    pub diagnosis_code: Option<String>,
}

pub(crate) fn scrap_motive(request: &ScrapRequest) -> Result<ScrapMotive> {
    ScrapMotive::normalize(&request.motive)
        .ok_or_else(|| LifecycleError::validation("a scrap motive is required"))
}

/// Electronic motives need a known diagnosis code.
pub(crate) fn scrap_entry(request: &ScrapRequest, codes: &dyn CodeLookup) -> Result<ScrapEntry> {
    let motive = scrap_motive(request)?;
    let diagnosis_code = match non_blank(request.diagnosis_code.as_deref()) {
        Some(code) => Some(
            codes
                .diagnosis(code)
                .map(|c| c.code.clone())
                .ok_or_else(|| LifecycleError::validation(format!("unknown diagnosis code '{code}'")))?,
        ),
        None => None,
    };

    if motive.requires_diagnosis() && diagnosis_code.is_none() {
        return Err(LifecycleError::validation(format!(
            "motive {motive} requires a diagnosis code"
        )));
    }

    Ok(ScrapEntry {
        motive,
        detail: request.detail,
        diagnosis_code,
    })
}

pub(crate) fn technician(value: Option<&str>) -> Result<String> {
    non_blank(value)
        .map(str::to_string)
        .ok_or_else(|| LifecycleError::validation("a responsible technician is required"))
}

/// Known diagnosis codes among those submitted. Unknown codes are dropped,
/// but at least one must survive.
pub(crate) fn diagnosis_codes<'a>(
    submitted: &[String],
    codes: &'a dyn CodeLookup,
) -> Result<Vec<&'a DiagnosisCode>> {
    if submitted.iter().all(|c| c.trim().is_empty()) {
        return Err(LifecycleError::validation("at least one diagnosis code is required"));
    }
    let found = dedup_lookup(submitted, |c| codes.diagnosis(c), |c| c.code.as_str());
    if found.is_empty() {
        return Err(LifecycleError::validation(format!(
            "none of the diagnosis codes are valid: {}",
            submitted.join(", ")
        )));
    }
    Ok(found)
}

/// Known repair codes among those submitted, with the same rules as diagnosis.
pub(crate) fn repair_codes<'a>(
    submitted: &[String],
    codes: &'a dyn CodeLookup,
) -> Result<Vec<&'a RepairCode>> {
    if submitted.iter().all(|c| c.trim().is_empty()) {
        return Err(LifecycleError::validation("at least one repair code is required"));
    }
    let found = dedup_lookup(submitted, |c| codes.repair(c), |c| c.code.as_str());
    if found.is_empty() {
        return Err(LifecycleError::validation(format!(
            "none of the repair codes are valid: {}",
            submitted.join(", ")
        )));
    }
    Ok(found)
}

pub(crate) fn require_scrap_tier(found: &[&RepairCode]) -> Result<()> {
    if found.iter().any(|c| c.scrap_tier) {
        Ok(())
    } else {
        Err(LifecycleError::validation(
            "a failed repair needs at least one scrap-tier repair code",
        ))
    }
}

fn dedup_lookup<'a, T, F, K>(submitted: &[String], lookup: F, key: K) -> Vec<&'a T>
where
    F: Fn(&str) -> Option<&'a T>,
    K: Fn(&T) -> &str,
{
    let mut found: Vec<&'a T> = Vec::new();
    for code in submitted {
        let Some(entry) = lookup(code.trim()) else {
            continue;
        };
        if !found.iter().any(|f| key(*f) == key(entry)) {
            found.push(entry);
        }
    }
    found
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
