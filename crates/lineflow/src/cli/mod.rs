//! CLI module for Lineflow
//!
//! Each subcommand lives in its own file with an args struct and a `run`
//! entry point. Shared plumbing (config, engine session, errors, tables)
//! sits alongside.

pub mod config;
pub mod context;
pub mod error;
pub mod output;

pub mod history;
pub mod list;
pub mod lot;
pub mod preview;
pub mod reconcile;
pub mod repair;
pub mod runs;
pub mod scrap_out;
pub mod scrap_stats;
pub mod seed;
pub mod transition;

use chrono::{DateTime, NaiveTime, Utc};
use lineflow_lifecycle::Phase;

/// clap value parser for phase names in any case.
pub fn parse_phase(s: &str) -> Result<Phase, String> {
    Phase::parse(s).ok_or_else(|| {
        let names: Vec<&str> = Phase::ALL.iter().map(|p| p.as_str()).collect();
        format!("unknown phase '{}' (expected one of {})", s, names.join(", "))
    })
}

/// clap value parser for a calendar day, as midnight UTC.
pub fn parse_day(s: &str) -> Result<DateTime<Utc>, String> {
    lineflow_intake::dates::parse_date(s)
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .ok_or_else(|| format!("unrecognized date '{}'", s))
}

/// Multi-threaded runtime so reconcile chunks run in parallel.
pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phase_is_lenient() {
        assert_eq!(parse_phase("test-inicial"), Ok(Phase::TestInicial));
        assert!(parse_phase("nowhere").unwrap_err().contains("REGISTRO"));
    }

    #[test]
    fn test_parse_day() {
        let day = parse_day("15-mar-24").unwrap();
        assert_eq!(day.format("%Y-%m-%d %H:%M").to_string(), "2024-03-15 00:00");
        assert!(parse_day("someday").is_err());
    }
}
