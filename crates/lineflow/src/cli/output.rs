//! Output formatting utilities for CLI commands

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

/// Print a table with a cyan header row
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

/// Print a two-column key/value table
pub fn print_summary(title: &str, pairs: Vec<(&str, String)>) {
    println!("{}", title);
    print_table(
        &["FIELD", "VALUE"],
        pairs.into_iter().map(|(k, v)| vec![k.to_string(), v]).collect(),
    );
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Minute-resolution UTC timestamp
pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// `-` for a missing value
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_time() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 9, 5, 0).unwrap();
        assert_eq!(format_time(at), "2024-03-15 09:05");
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(None::<&str>), "-");
        assert_eq!(or_dash(Some("N003")), "N003");
    }
}
