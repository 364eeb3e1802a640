//! History command - read the transition log

use crate::cli::context::GlobalArgs;
use crate::cli::error::helpful;
use crate::cli::output::print_json;
use crate::cli::transition::print_records;
use chrono::{DateTime, Utc};
use lineflow_db::RecordFilter;
use lineflow_lifecycle::Phase;

#[derive(Debug)]
pub struct HistoryArgs {
    pub serial: Option<String>,
    pub phase: Option<Phase>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: u32,
    pub json: bool,
}

pub fn run(global: GlobalArgs, args: HistoryArgs) -> anyhow::Result<()> {
    let filter = RecordFilter {
        serial: args.serial,
        phase: args.phase,
        since: args.since,
        until: args.until,
        codes_only: false,
        limit: Some(args.limit),
    };

    let rt = crate::cli::runtime()?;
    let records = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(engine.history(&filter).await)
    })?;

    if args.json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No records match.");
        return Ok(());
    }
    print_records(&records);
    Ok(())
}
