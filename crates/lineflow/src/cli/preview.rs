//! Preview command - show how a batch file will be read
//!
//! Runs decoding, structure detection and row normalization only. Nothing
//! is written, so operators can check a file before reconciling it.

use crate::cli::context::GlobalArgs;
use crate::cli::error::HelpfulError;
use crate::cli::output::{format_time, or_dash, print_json, print_summary, print_table};
use chrono::Utc;
use lineflow_intake::{
    decode_text, parse_batch, CanonicalRow, ColumnMap, NormalizeOptions, RowRejection, Structure, TextEncoding,
    UnmatchedOutbound,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct PreviewArgs {
    pub file: PathBuf,
    pub rows: usize,
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct PreviewResult {
    pub file_path: PathBuf,
    pub encoding: TextEncoding,
    pub structure: Structure,
    pub row_count: usize,
    pub rows: Vec<CanonicalRow>,
    pub rejected: Vec<RowRejection>,
    pub unmatched: Vec<UnmatchedOutbound>,
}

/// Read and decode a batch file.
pub fn read_batch_file(path: &Path) -> anyhow::Result<(String, TextEncoding)> {
    if !path.exists() {
        return Err(HelpfulError::file_not_found(path).into());
    }
    let bytes = std::fs::read(path).map_err(|e| HelpfulError::cannot_read_file(path, &e.to_string()))?;
    let decoded = decode_text(&bytes);
    Ok((decoded.text, decoded.encoding))
}

pub fn run(global: GlobalArgs, args: PreviewArgs) -> anyhow::Result<()> {
    let min_serial_len = global.load_config()?.engine.min_serial_len;
    let result = preview_file(&args.file, args.rows, min_serial_len)?;

    if args.json {
        return print_json(&result);
    }
    print_preview(&result);
    Ok(())
}

pub fn preview_file(path: &Path, rows: usize, min_serial_len: usize) -> anyhow::Result<PreviewResult> {
    let (text, encoding) = read_batch_file(path)?;
    let mut options = NormalizeOptions::new(Utc::now());
    options.min_serial_len = min_serial_len;
    let parsed = parse_batch(&text, &options).map_err(|e| {
        HelpfulError::new(e.to_string())
            .with_context(format!("Nothing to read in {}", path.display()))
            .with_suggestion("TRY: Check that the file has one serial per line")
    })?;

    let row_count = parsed.batch.rows.len();
    let mut sample = parsed.batch.rows;
    sample.truncate(rows);

    Ok(PreviewResult {
        file_path: path.to_path_buf(),
        encoding,
        structure: parsed.structure,
        row_count,
        rows: sample,
        rejected: parsed.batch.rejected,
        unmatched: parsed.batch.unmatched,
    })
}

fn describe_columns(columns: &ColumnMap) -> String {
    let roles = [
        ("serial", columns.serial),
        ("material", columns.material),
        ("folio", columns.folio),
        ("date", columns.date),
        ("inbound", columns.inbound),
        ("outbound", columns.outbound),
    ];
    let named: Vec<String> = roles
        .iter()
        .filter_map(|(name, index)| index.map(|i| format!("{name}={i}")))
        .collect();
    if named.is_empty() {
        "-".to_string()
    } else {
        named.join(", ")
    }
}

fn print_preview(result: &PreviewResult) {
    let s = &result.structure;
    print_summary(
        &format!("{}", result.file_path.display()),
        vec![
            ("encoding", format!("{:?}", result.encoding)),
            ("delimiter", s.delimiter.to_string()),
            ("header", s.has_header.to_string()),
            ("strategy", format!("{:?}", s.strategy)),
            ("confidence", format!("{:?}", s.confidence)),
            ("columns", describe_columns(&s.columns)),
            ("reasoning", s.reasoning.clone()),
            ("rows", result.row_count.to_string()),
            ("rejected", result.rejected.len().to_string()),
            ("unmatched outbound", result.unmatched.len().to_string()),
        ],
    );

    if !result.rows.is_empty() {
        print_table(
            &["LINE", "SERIAL", "MATERIAL", "FOLIO", "RECEIVED", "OUTBOUND"],
            result
                .rows
                .iter()
                .map(|r| {
                    vec![
                        r.line.to_string(),
                        r.serial.clone(),
                        or_dash(r.material_code.as_deref()),
                        or_dash(r.batch_tag.as_deref()),
                        if r.received_defaulted {
                            "(default)".to_string()
                        } else {
                            format_time(r.received_at)
                        },
                        or_dash(r.outbound_serial.as_deref()),
                    ]
                })
                .collect(),
        );
    }

    if !result.rejected.is_empty() {
        print_table(
            &["LINE", "REJECTED BECAUSE"],
            result
                .rejected
                .iter()
                .map(|r| vec![r.line.to_string(), r.reason.clone()])
                .collect(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_preview_detects_header_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("batch.csv");
        std::fs::write(&path, "sn,material,folio,fecha\nABC123456,76735,F1,01-ene-24\nXY,76735,F1,\n").unwrap();

        let result = preview_file(&path, 10, 6).unwrap();
        assert!(result.structure.has_header);
        assert_eq!(result.row_count, 1);
        assert_eq!(result.rows[0].serial, "ABC123456");
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].line, 3);
    }

    #[test]
    fn test_missing_file_is_helpful() {
        let err = preview_file(Path::new("/nonexistent/batch.csv"), 10, 6).unwrap_err();
        assert!(format!("{err}").contains("File not found"));
    }
}
