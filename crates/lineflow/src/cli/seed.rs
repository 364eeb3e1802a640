//! Seed command - create the state, code and SKU catalogs

use crate::cli::context::GlobalArgs;
use crate::cli::error::helpful;
use crate::cli::output::print_summary;

pub fn run(global: GlobalArgs) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;
    rt.block_on(async {
        let engine = global.open_engine().await?;
        let summary = helpful(engine.seed().await)?;
        print_summary(
            "Catalogs seeded",
            vec![
                ("states", summary.states.to_string()),
                ("diagnosis codes", summary.diagnosis_codes.to_string()),
                ("repair codes", summary.repair_codes.to_string()),
                ("skus", summary.skus.to_string()),
            ],
        );
        Ok(())
    })
}
