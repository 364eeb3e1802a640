//! Scrap-stats command - SCRAP inventory breakdown

use crate::cli::context::GlobalArgs;
use crate::cli::error::helpful;
use crate::cli::output::{print_json, print_table};

pub fn run(global: GlobalArgs, json: bool) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;
    let stats = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(engine.scrap_stats().await)
    })?;

    if json {
        return print_json(&stats);
    }
    println!("{} item(s) in SCRAP", stats.total);
    for (title, counts) in [
        ("MOTIVE", &stats.by_motive),
        ("DETAIL", &stats.by_detail),
        ("SKU", &stats.by_sku),
    ] {
        if counts.is_empty() {
            continue;
        }
        print_table(
            &[title, "ITEMS"],
            counts
                .iter()
                .map(|(label, n)| vec![label.clone(), n.to_string()])
                .collect(),
        );
    }
    Ok(())
}
