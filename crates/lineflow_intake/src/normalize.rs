//! Canonical rows from detected columns.

use crate::dates::parse_date;
use crate::detect::{split_line, Structure};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Shortest serial accepted when no option says otherwise.
pub const DEFAULT_MIN_SERIAL_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub min_serial_len: usize,
    /// Date given to rows whose date is missing or unparseable.
    pub received_default: DateTime<Utc>,
}

impl NormalizeOptions {
    pub fn new(received_default: DateTime<Utc>) -> Self {
        Self {
            min_serial_len: DEFAULT_MIN_SERIAL_LEN,
            received_default,
        }
    }
}

/// One item line in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRow {
    /// 1-based line in the source text.
    pub line: usize,
    pub serial: String,
    pub material_code: Option<String>,
    pub batch_tag: Option<String>,
    pub received_at: DateTime<Utc>,
    /// `received_at` came from `NormalizeOptions::received_default`.
    pub received_defaulted: bool,
    /// Outbound serial paired with this one on an entrada/salida line.
    pub outbound_serial: Option<String>,
}

/// A line that could not become a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRejection {
    pub line: usize,
    pub reason: String,
}

/// An outbound serial whose line has no usable inbound serial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedOutbound {
    pub line: usize,
    pub serial: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedBatch {
    pub rows: Vec<CanonicalRow>,
    pub rejected: Vec<RowRejection>,
    pub unmatched: Vec<UnmatchedOutbound>,
}

/// Uppercase and length-check a raw serial token.
pub fn canonical_serial(raw: &str, min_len: usize) -> Result<String, String> {
    let serial = raw.trim().trim_matches('"').trim().to_uppercase();
    if serial.is_empty() {
        return Err("empty serial".to_string());
    }
    if serial.chars().count() < min_len {
        return Err(format!(
            "serial '{serial}' is shorter than {min_len} characters"
        ));
    }
    Ok(serial)
}

fn optional_field(fields: &[String], index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| fields.get(i))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Turn every data line of `text` into a canonical row or a rejection.
pub fn normalize(text: &str, structure: &Structure, options: &NormalizeOptions) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let mut header_pending = structure.has_header;

    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        if raw_line.trim().is_empty() {
            continue;
        }
        if header_pending {
            header_pending = false;
            continue;
        }

        if structure.is_serial_list() {
            match canonical_serial(raw_line, options.min_serial_len) {
                Ok(serial) => batch.rows.push(CanonicalRow {
                    line,
                    serial,
                    material_code: None,
                    batch_tag: None,
                    received_at: options.received_default,
                    received_defaulted: true,
                    outbound_serial: None,
                }),
                Err(reason) => batch.rejected.push(RowRejection { line, reason }),
            }
            continue;
        }

        let fields = split_line(raw_line, structure.delimiter);
        let columns = &structure.columns;
        let outbound = optional_field(&fields, columns.outbound)
            .and_then(|raw| canonical_serial(raw, options.min_serial_len).ok());
        let serial_raw = optional_field(&fields, columns.serial).unwrap_or("");

        let serial = match canonical_serial(serial_raw, options.min_serial_len) {
            Ok(serial) => serial,
            Err(reason) => {
                match outbound {
                    Some(serial) => batch.unmatched.push(UnmatchedOutbound { line, serial }),
                    None => batch.rejected.push(RowRejection { line, reason }),
                }
                continue;
            }
        };

        let parsed_date = optional_field(&fields, columns.date).and_then(parse_date);
        let received_at = parsed_date
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
            .unwrap_or(options.received_default);

        batch.rows.push(CanonicalRow {
            line,
            serial,
            material_code: optional_field(&fields, columns.material).map(str::to_string),
            batch_tag: optional_field(&fields, columns.folio).map(str::to_uppercase),
            received_at,
            received_defaulted: parsed_date.is_none(),
            outbound_serial: outbound,
        });
    }

    batch
}

/// Keep the first row for each serial; return `(unique, duplicates)`.
pub fn dedup_rows(rows: Vec<CanonicalRow>) -> (Vec<CanonicalRow>, Vec<CanonicalRow>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(rows.len());
    let mut duplicates = Vec::new();
    for row in rows {
        if seen.insert(row.serial.clone()) {
            unique.push(row);
        } else {
            duplicates.push(row);
        }
    }
    (unique, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detect_structure;
    use chrono::TimeZone;

    fn options() -> NormalizeOptions {
        NormalizeOptions::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }

    fn run(text: &str) -> NormalizedBatch {
        normalize(text, &detect_structure(text), &options())
    }

    #[test]
    fn test_header_row_canonicalized() {
        let batch = run("SN,Material,Folio,Fecha\nabc123456,76735,f1,01-ene-24\n");
        assert_eq!(batch.rows.len(), 1);
        let row = &batch.rows[0];
        assert_eq!(row.line, 2);
        assert_eq!(row.serial, "ABC123456");
        assert_eq!(row.material_code.as_deref(), Some("76735"));
        assert_eq!(row.batch_tag.as_deref(), Some("F1"));
        assert_eq!(row.received_at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(!row.received_defaulted);
    }

    #[test]
    fn test_bad_date_defaults_instead_of_rejecting() {
        let batch = run("SN,Fecha\nABC123456,someday\n");
        assert_eq!(batch.rows.len(), 1);
        assert!(batch.rows[0].received_defaulted);
        assert_eq!(batch.rows[0].received_at, options().received_default);
    }

    #[test]
    fn test_empty_serial_is_rejected_alone() {
        let batch = run("SN,Material\nABC123456,76735\n,76735\nDEF654321,76735\n");
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].line, 3);
    }

    #[test]
    fn test_bare_serials_apply_min_length() {
        let batch = run("abc123456\nshort\n\n  def654321  \n");
        let serials: Vec<&str> = batch.rows.iter().map(|r| r.serial.as_str()).collect();
        assert_eq!(serials, vec!["ABC123456", "DEF654321"]);
        assert_eq!(batch.rejected.len(), 1);
    }

    #[test]
    fn test_paired_lines() {
        let batch = run("ENTRADA,SALIDA\nABC123456,XYZ987654\nDEF654321,\n,QRS111222\n");
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rows[0].outbound_serial.as_deref(), Some("XYZ987654"));
        assert_eq!(batch.rows[1].outbound_serial, None);
        assert_eq!(batch.unmatched, vec![UnmatchedOutbound { line: 4, serial: "QRS111222".into() }]);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let batch = run("SN\nABC123456\nDEF654321\nabc123456\n");
        let (unique, duplicates) = dedup_rows(batch.rows);
        assert_eq!(unique.len(), 2);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].line, 4);
    }
}
