//! Batch file intake for Lineflow.
//!
//! Turns the raw bytes of an operator-supplied serial list into canonical
//! rows. Everything here is pure: the same input text always yields the
//! same structure and rows.
//!
//! ```rust,ignore
//! use lineflow_intake::{decode_text, parse_batch, NormalizeOptions};
//!
//! let text = decode_text(&bytes).text;
//! let parsed = parse_batch(&text, &NormalizeOptions::new(chrono::Utc::now()))?;
//! ```

pub mod dates;
pub mod decode;
pub mod detect;
pub mod normalize;

pub use decode::{decode_text, DecodedText, TextEncoding};
pub use detect::{
    detect_delimiter, detect_structure, split_line, ColumnMap, ColumnRole, Delimiter,
    DetectionConfidence, StrategyKind, Structure,
};
pub use normalize::{
    canonical_serial, dedup_rows, normalize, CanonicalRow, NormalizeOptions, NormalizedBatch,
    RowRejection, UnmatchedOutbound, DEFAULT_MIN_SERIAL_LEN,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("input has no data lines")]
    Empty,
}

pub type Result<T> = std::result::Result<T, IntakeError>;

/// Detected structure plus normalized rows.
#[derive(Debug, Clone)]
pub struct ParsedBatch {
    pub structure: Structure,
    pub batch: NormalizedBatch,
}

/// Detect the structure of `text` and normalize every line.
pub fn parse_batch(text: &str, options: &NormalizeOptions) -> Result<ParsedBatch> {
    if text.lines().all(|l| l.trim().is_empty()) {
        return Err(IntakeError::Empty);
    }
    let structure = detect_structure(text);
    let batch = normalize(text, &structure, options);
    tracing::debug!(
        strategy = ?structure.strategy,
        delimiter = %structure.delimiter,
        rows = batch.rows.len(),
        rejected = batch.rejected.len(),
        unmatched = batch.unmatched.len(),
        "Parsed batch"
    );
    Ok(ParsedBatch { structure, batch })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_empty_input_is_an_error() {
        let options = NormalizeOptions::new(Utc::now());
        assert!(matches!(parse_batch("\n \n", &options), Err(IntakeError::Empty)));
    }

    #[test]
    fn test_scenario_row() {
        let options = NormalizeOptions::new(Utc::now());
        let parsed = parse_batch("sn,material,folio,fecha\nABC123456,76735,F1,01-ene-24\n", &options).unwrap();
        assert_eq!(parsed.batch.rows.len(), 1);
        assert_eq!(parsed.batch.rows[0].serial, "ABC123456");
        assert!(parsed.batch.rejected.is_empty());
    }

    #[test]
    fn test_paired_rows_take_inbound_date() {
        let options = NormalizeOptions::new(Utc::now());
        let parsed = parse_batch(
            "Entrada,Fecha Entrada,Salida,Fecha Salida\nABC123456,15-mar-24,XYZ987654,16-mar-24\n",
            &options,
        )
        .unwrap();
        let row = &parsed.batch.rows[0];
        assert_eq!(row.received_at.date_naive(), chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(row.outbound_serial.as_deref(), Some("XYZ987654"));
    }
}
