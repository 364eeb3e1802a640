//! Scrap-out command - ship a scrapped item in a scrap lot

use crate::cli::context::GlobalArgs;
use crate::cli::error::helpful;
use crate::cli::output::print_json;
use crate::cli::transition::print_records;
use lineflow_lifecycle::ScrapDetail;

#[derive(Debug)]
pub struct ScrapOutArgs {
    pub serial: String,
    pub detail: String,
    pub lot: Option<String>,
    pub json: bool,
}

pub fn run(global: GlobalArgs, args: ScrapOutArgs) -> anyhow::Result<()> {
    let actor = global.actor()?;
    let detail = ScrapDetail::normalize(&args.detail);

    let rt = crate::cli::runtime()?;
    let outcome = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(
            engine
                .register_scrap_output(&args.serial, detail, args.lot.as_deref(), &actor)
                .await,
        )
    })?;

    if args.json {
        return print_json(&outcome);
    }
    println!("{} added to scrap lot {}", outcome.item.serial, outcome.lot.number);
    print_records(&outcome.records);
    Ok(())
}
