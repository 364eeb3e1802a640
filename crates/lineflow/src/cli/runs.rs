//! Runs command - the reconcile journal

use crate::cli::context::GlobalArgs;
use crate::cli::error::helpful;
use crate::cli::output::{format_time, or_dash, print_json, print_table};

pub fn run(global: GlobalArgs, limit: u32, json: bool) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;
    let runs = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(engine.recent_runs(limit).await)
    })?;

    if json {
        return print_json(&runs);
    }
    print_table(
        &["ID", "OPERATION", "SOURCE", "USER", "OK", "SKIP", "FAIL", "UNMATCHED", "CHUNKS", "STARTED", "STATUS"],
        runs.iter()
            .map(|r| {
                let status = match (r.finished_at, r.cancelled) {
                    (None, _) => "running",
                    (Some(_), true) => "cancelled",
                    (Some(_), false) => "done",
                };
                vec![
                    r.id.to_string(),
                    r.operation.clone(),
                    or_dash(r.source_name.as_deref()),
                    r.user_id.clone(),
                    r.accepted.to_string(),
                    r.skipped.to_string(),
                    r.failed.to_string(),
                    r.unmatched.to_string(),
                    r.chunks_started.to_string(),
                    format_time(r.started_at),
                    status.to_string(),
                ]
            })
            .collect(),
    );
    Ok(())
}
