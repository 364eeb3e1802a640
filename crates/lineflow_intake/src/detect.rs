//! Structure detection for batch files.
//!
//! Infers the field delimiter, whether the first line is a header, and
//! which column holds which role. Detection runs over a leading sample and
//! tries an ordered list of strategies, taking the first that finds a
//! serial column. The last strategy always succeeds.

use crate::dates::looks_like_date;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Characters of input considered when counting delimiters.
const DELIMITER_SAMPLE_CHARS: usize = 5000;

/// Non-empty lines handed to the strategies.
const SAMPLE_LINES: usize = 50;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());
static MATERIAL_SHAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5,6}$").unwrap());
static HEX_SERIAL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Fa-f0-9]{12,}$").unwrap());
static ALNUM_SERIAL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{8,}$").unwrap());
static FOLIO_SHAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{2,}$").unwrap());

/// Field separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    Comma,
    Semicolon,
    Tab,
    Pipe,
    /// Two or more consecutive spaces (fixed-width style exports).
    Spaces,
}

impl Delimiter {
    const CANDIDATES: [Delimiter; 5] = [
        Delimiter::Comma,
        Delimiter::Semicolon,
        Delimiter::Tab,
        Delimiter::Pipe,
        Delimiter::Spaces,
    ];

    fn as_char(&self) -> Option<char> {
        match self {
            Self::Comma => Some(','),
            Self::Semicolon => Some(';'),
            Self::Tab => Some('\t'),
            Self::Pipe => Some('|'),
            Self::Spaces => None,
        }
    }

    fn count_in(&self, sample: &str) -> usize {
        match self.as_char() {
            Some(c) => sample.matches(c).count(),
            None => WHITESPACE_RUN.find_iter(sample).count(),
        }
    }
}

impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Comma => "comma",
            Self::Semicolon => "semicolon",
            Self::Tab => "tab",
            Self::Pipe => "pipe",
            Self::Spaces => "spaces",
        };
        write!(f, "{label}")
    }
}

/// Pick the candidate separator that occurs most often in the leading
/// sample. Ties go to the earlier candidate; no occurrences means comma.
pub fn detect_delimiter(text: &str) -> Delimiter {
    let sample: String = text.chars().take(DELIMITER_SAMPLE_CHARS).collect();
    let mut best = (Delimiter::Comma, 0usize);
    for candidate in Delimiter::CANDIDATES {
        let count = candidate.count_in(&sample);
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

/// Split one line into trimmed fields. Quoted fields may contain the
/// delimiter; surrounding quotes are removed and `""` becomes `"`.
pub fn split_line(line: &str, delimiter: Delimiter) -> Vec<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(delim) = delimiter.as_char() else {
        return WHITESPACE_RUN
            .split(line.trim())
            .map(|f| f.trim().to_string())
            .collect();
    };

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delim && !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// What a column carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Serial,
    Material,
    Folio,
    Date,
    Inbound,
    Outbound,
}

/// Column index for each detected role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub serial: Option<usize>,
    pub material: Option<usize>,
    pub folio: Option<usize>,
    pub date: Option<usize>,
    pub inbound: Option<usize>,
    pub outbound: Option<usize>,
}

impl ColumnMap {
    fn slot(&mut self, role: ColumnRole) -> &mut Option<usize> {
        match role {
            ColumnRole::Serial => &mut self.serial,
            ColumnRole::Material => &mut self.material,
            ColumnRole::Folio => &mut self.folio,
            ColumnRole::Date => &mut self.date,
            ColumnRole::Inbound => &mut self.inbound,
            ColumnRole::Outbound => &mut self.outbound,
        }
    }

    /// Assign `role` to `index` unless the role is already taken.
    fn claim(&mut self, role: ColumnRole, index: usize) {
        let slot = self.slot(role);
        if slot.is_none() {
            *slot = Some(index);
        }
    }

    /// Entrada/salida files carry inbound and outbound serials on one line.
    pub fn is_paired(&self) -> bool {
        self.inbound.is_some() && self.outbound.is_some()
    }
}

/// How trustworthy the detection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionConfidence {
    High,
    Medium,
    Low,
}

/// Which strategy produced the structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    HeaderKeywords,
    ContentShape,
    SerialList,
}

/// Detected layout of a batch file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub delimiter: Delimiter,
    pub has_header: bool,
    pub columns: ColumnMap,
    pub strategy: StrategyKind,
    pub confidence: DetectionConfidence,
    pub reasoning: String,
}

impl Structure {
    /// Every line is one bare serial.
    pub fn is_serial_list(&self) -> bool {
        self.strategy == StrategyKind::SerialList
    }
}

/// Leading lines of the input, already split.
pub struct Sample {
    pub delimiter: Delimiter,
    pub rows: Vec<Vec<String>>,
}

impl Sample {
    pub fn new(text: &str, delimiter: Delimiter) -> Self {
        let rows = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .take(SAMPLE_LINES)
            .map(|l| split_line(l, delimiter))
            .collect();
        Self { delimiter, rows }
    }
}

type Strategy = fn(&Sample) -> Option<Structure>;

/// Tried in order; the first confident match wins.
const STRATEGIES: &[Strategy] = &[header_keywords, content_shape, serial_list];

/// Detect the layout of `text`.
pub fn detect_structure(text: &str) -> Structure {
    let delimiter = detect_delimiter(text);
    let sample = Sample::new(text, delimiter);
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(&sample))
        .unwrap_or_else(|| fallback_list(delimiter))
}

/// Role named by a header cell, if any.
fn header_role(cell: &str) -> Option<ColumnRole> {
    let name = cell.trim().to_lowercase();
    // "Fecha Entrada" is a date column, so entrada/salida are checked last.
    if name.contains("material") {
        Some(ColumnRole::Material)
    } else if name.contains("serie")
        || name.contains("serial")
        || name.contains("number")
        || matches!(name.as_str(), "sn" | "ns" | "s/n" | "n/s")
    {
        Some(ColumnRole::Serial)
    } else if name.contains("folio") {
        Some(ColumnRole::Folio)
    } else if name.contains("fecha") || name.contains("recibo") || name.contains("date") {
        Some(ColumnRole::Date)
    } else if name.contains("entrada") {
        Some(ColumnRole::Inbound)
    } else if name.contains("salida") {
        Some(ColumnRole::Outbound)
    } else {
        None
    }
}

/// A header cell that marks the line as a header without naming a role.
fn is_header_marker(cell: &str) -> bool {
    cell.trim().to_lowercase().contains("proceso")
}

fn looks_like_header(row: &[String]) -> bool {
    row.iter()
        .any(|cell| header_role(cell).is_some() || is_header_marker(cell))
}

/// Roles named by a header line.
fn header_keywords(sample: &Sample) -> Option<Structure> {
    let header = sample.rows.first()?;
    if !looks_like_header(header) {
        return None;
    }

    let mut columns = ColumnMap::default();
    for (index, cell) in header.iter().enumerate() {
        if let Some(role) = header_role(cell) {
            columns.claim(role, index);
        }
    }
    if columns.serial.is_none() {
        columns.serial = columns.inbound;
    }
    columns.serial?;

    Some(Structure {
        delimiter: sample.delimiter,
        has_header: true,
        reasoning: format!(
            "Header line names {} column(s): {}",
            header.len(),
            header.join(", ")
        ),
        columns,
        strategy: StrategyKind::HeaderKeywords,
        confidence: DetectionConfidence::High,
    })
}

/// Shape of a headerless cell. Order matters: a material code is also a
/// valid folio, and a date is also a valid folio.
fn shape_role(cell: &str) -> Option<ColumnRole> {
    if MATERIAL_SHAPE.is_match(cell) {
        Some(ColumnRole::Material)
    } else if looks_like_date(cell) {
        Some(ColumnRole::Date)
    } else if HEX_SERIAL_SHAPE.is_match(cell)
        || (ALNUM_SERIAL_SHAPE.is_match(cell) && cell.chars().any(|c| c.is_ascii_digit()))
    {
        Some(ColumnRole::Serial)
    } else if FOLIO_SHAPE.is_match(cell) {
        Some(ColumnRole::Folio)
    } else {
        None
    }
}

/// Roles inferred from the first data line's content.
fn content_shape(sample: &Sample) -> Option<Structure> {
    let has_header = sample.rows.first().is_some_and(|row| looks_like_header(row));
    let row = sample.rows.get(usize::from(has_header))?;

    let mut columns = ColumnMap::default();
    for (index, cell) in row.iter().enumerate() {
        if let Some(role) = shape_role(cell) {
            columns.claim(role, index);
        }
    }
    columns.serial?;

    Some(Structure {
        delimiter: sample.delimiter,
        has_header,
        reasoning: format!(
            "Inferred roles from content of a {}-field row",
            row.len()
        ),
        columns,
        strategy: StrategyKind::ContentShape,
        confidence: DetectionConfidence::Medium,
    })
}

/// Every non-empty line is a bare serial.
fn serial_list(sample: &Sample) -> Option<Structure> {
    Some(fallback_list(sample.delimiter))
}

fn fallback_list(delimiter: Delimiter) -> Structure {
    Structure {
        delimiter,
        has_header: false,
        columns: ColumnMap {
            serial: Some(0),
            ..ColumnMap::default()
        },
        strategy: StrategyKind::SerialList,
        confidence: DetectionConfidence::Low,
        reasoning: "No serial-like column found; treating each line as a serial".to_string(),
    }
}
