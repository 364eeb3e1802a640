//! Repair bench views: one item's diagnosis/repair trail, and the queue

use crate::cli::context::GlobalArgs;
use crate::cli::error::helpful;
use crate::cli::list::print_items;
use crate::cli::output::{format_time, or_dash, print_json, print_table};

pub fn run_history(global: GlobalArgs, serial: &str, json: bool) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;
    let records = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(engine.repair_history(serial).await)
    })?;

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No diagnosis or repair entries for {}.", serial.trim().to_uppercase());
        return Ok(());
    }
    print_table(
        &["WHEN", "PHASE", "DISPOSITION", "DIAG", "REPAIR", "TECHNICIAN", "OBSERVATIONS"],
        records
            .iter()
            .map(|r| {
                vec![
                    format_time(r.created_at),
                    r.phase.to_string(),
                    r.disposition.clone(),
                    or_dash(r.diagnosis_code.as_deref()),
                    or_dash(r.repair_code.as_deref()),
                    or_dash(r.technician.as_deref()),
                    or_dash(r.note.as_deref()),
                ]
            })
            .collect(),
    );
    Ok(())
}

pub fn run_queue(global: GlobalArgs, json: bool) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;
    let items = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(engine.pending_repairs().await)
    })?;

    if json {
        return print_json(&items);
    }
    println!("{} item(s) waiting for repair", items.len());
    print_items(&items);
    Ok(())
}
