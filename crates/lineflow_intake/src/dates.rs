//! Received-date parsing.
//!
//! Exactly three literal shapes are accepted. Anything else is a parse
//! failure; the normalizer then defaults the row's date instead of
//! rejecting the row.

use chrono::NaiveDate;
use lineflow_lifecycle::fold_accents;
use regex::Regex;
use std::sync::LazyLock;

static DAY_MONTH_NAME_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})[-\s]([a-z]{3,4})\.?[-\s](\d{2}|\d{4})$").unwrap()
});
static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap()
});
static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap()
});

/// The accepted date shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateShape {
    /// `DD-MMM-YY` or `DD-MMM-YYYY` with a Spanish or English month abbreviation.
    DayMonthNameYear,
    /// `DD/MM/YYYY`.
    DayMonthYear,
    /// `YYYY-MM-DD`.
    IsoDate,
}

pub struct DateFormatSpec {
    pub shape: DateShape,
    pub example: &'static str,
}

/// Formats tried in order.
pub const DATE_FORMATS: &[DateFormatSpec] = &[
    DateFormatSpec {
        shape: DateShape::DayMonthNameYear,
        example: "01-ene-24",
    },
    DateFormatSpec {
        shape: DateShape::DayMonthYear,
        example: "31/01/2024",
    },
    DateFormatSpec {
        shape: DateShape::IsoDate,
        example: "2024-01-31",
    },
];

/// Month abbreviations, Spanish first. English entries only where they differ.
const MONTHS: &[(&str, u32)] = &[
    ("ene", 1),
    ("feb", 2),
    ("mar", 3),
    ("abr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("ago", 8),
    ("sep", 9),
    ("sept", 9),
    ("oct", 10),
    ("nov", 11),
    ("dic", 12),
    ("jan", 1),
    ("apr", 4),
    ("aug", 8),
    ("dec", 12),
];

/// Parse a date in any accepted shape.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| try_parse_date(value, format))
}

/// Whether `value` has the shape of an accepted date, valid or not.
pub fn looks_like_date(value: &str) -> bool {
    let folded = fold_accents(value);
    DAY_MONTH_NAME_YEAR.is_match(&folded)
        || DAY_MONTH_YEAR.is_match(&folded)
        || ISO_DATE.is_match(&folded)
}

pub fn try_parse_date(value: &str, format: &DateFormatSpec) -> Option<NaiveDate> {
    let folded = fold_accents(value);
    match format.shape {
        DateShape::DayMonthNameYear => {
            let caps = DAY_MONTH_NAME_YEAR.captures(&folded)?;
            let day: u32 = caps[1].parse().ok()?;
            let month = month_number(&caps[2])?;
            let year = expand_year(caps[3].parse().ok()?);
            NaiveDate::from_ymd_opt(year, month, day)
        }
        DateShape::DayMonthYear => {
            let caps = DAY_MONTH_YEAR.captures(&folded)?;
            NaiveDate::from_ymd_opt(caps[3].parse().ok()?, caps[2].parse().ok()?, caps[1].parse().ok()?)
        }
        DateShape::IsoDate => {
            let caps = ISO_DATE.captures(&folded)?;
            NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
        }
    }
}

fn month_number(abbrev: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(name, _)| *name == abbrev)
        .map(|(_, month)| *month)
}

/// Two-digit years are in this century.
fn expand_year(year: i32) -> i32 {
    if year < 100 {
        2000 + year
    } else {
        year
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_spanish_month_names() {
        assert_eq!(parse_date("01-ene-24"), ymd(2024, 1, 1));
        assert_eq!(parse_date("15-AGO-2023"), ymd(2023, 8, 15));
        assert_eq!(parse_date("3-dic-24"), ymd(2024, 12, 3));
        assert_eq!(parse_date("10-sept-24"), ymd(2024, 9, 10));
    }

    #[test]
    fn test_english_month_names() {
        assert_eq!(parse_date("01-Jan-24"), ymd(2024, 1, 1));
        assert_eq!(parse_date("20-dec-2024"), ymd(2024, 12, 20));
    }

    #[test]
    fn test_numeric_shapes() {
        assert_eq!(parse_date("31/01/2024"), ymd(2024, 1, 31));
        assert_eq!(parse_date("2024-01-31"), ymd(2024, 1, 31));
    }

    #[test]
    fn test_invalid_values_fail() {
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("01-xyz-24"), None);
        assert_eq!(parse_date("01/31/24"), None);
        assert_eq!(parse_date("20240131"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_shape_without_validity() {
        assert!(looks_like_date("31/02/2024"));
        assert!(looks_like_date("01-ene-24"));
        assert!(!looks_like_date("76735"));
        assert!(!looks_like_date("ABC123456"));
    }
}
