//! Lot command - list, close and purge lots

use crate::cli::context::GlobalArgs;
use crate::cli::error::helpful;
use crate::cli::output::{format_time, or_dash, print_json, print_table};
use tracing::info;

pub fn run_list(global: GlobalArgs, limit: Option<u32>, json: bool) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;
    let lots = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(engine.list_lots(limit).await)
    })?;

    if json {
        return print_json(&lots);
    }
    print_table(
        &["NUMBER", "TYPE", "SKU", "SCRAP", "STATUS", "PRIORITY", "RESPONSIBLE", "CREATED"],
        lots.iter()
            .map(|l| {
                vec![
                    l.number.clone(),
                    l.lot_type.to_string(),
                    or_dash(l.sku.as_deref()),
                    or_dash(l.scrap_motive),
                    l.status.to_string(),
                    l.priority.to_string(),
                    or_dash(l.responsible_id.as_deref()),
                    format_time(l.created_at),
                ]
            })
            .collect(),
    );
    Ok(())
}

pub fn run_close(global: GlobalArgs, number: &str) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;
    let lot = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(engine.close_lot(number).await)
    })?;
    println!("Lot {} is {}", lot.number, lot.status);
    Ok(())
}

pub fn run_purge(global: GlobalArgs, number: &str, confirm: &str) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;
    let summary = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(engine.purge_lot(number, confirm).await)
    })?;
    info!(lot = %summary.lot_number, "Lot purged from CLI");
    println!(
        "Purged lot {}: {} item(s) removed, {} outbound reference(s) cleared",
        summary.lot_number, summary.items_tombstoned, summary.outbound_refs_cleared
    );
    Ok(())
}
