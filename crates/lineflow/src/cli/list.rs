//! List command - items in one phase

use crate::cli::context::GlobalArgs;
use crate::cli::error::helpful;
use crate::cli::output::{format_time, or_dash, print_json, print_table};
use lineflow_db::{Item, ItemFilter};
use lineflow_lifecycle::{Phase, ScrapMotive};

#[derive(Debug)]
pub struct ListArgs {
    pub phase: Phase,
    pub lot: Option<String>,
    pub sku: Option<String>,
    pub motive: Option<String>,
    pub limit: u32,
    pub json: bool,
}

pub fn run(global: GlobalArgs, args: ListArgs) -> anyhow::Result<()> {
    let filter = ItemFilter {
        phase: None,
        lot_number: args.lot,
        sku: args.sku,
        scrap_motive: args.motive.as_deref().and_then(ScrapMotive::normalize),
        include_deleted: false,
        limit: Some(args.limit),
    };

    let rt = crate::cli::runtime()?;
    let items = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(engine.list_by_phase(args.phase, filter).await)
    })?;

    if args.json {
        return print_json(&items);
    }
    println!("{} item(s) in {}", items.len(), args.phase);
    print_items(&items);
    Ok(())
}

pub fn print_items(items: &[Item]) {
    print_table(
        &["SERIAL", "PHASE", "SKU", "FOLIO", "MOTIVE", "DETAIL", "RESPONSIBLE", "UPDATED"],
        items
            .iter()
            .map(|i| {
                vec![
                    i.serial.clone(),
                    i.phase.to_string(),
                    or_dash(i.sku.as_deref()),
                    or_dash(i.batch_tag.as_deref()),
                    or_dash(i.scrap_motive),
                    or_dash(i.scrap_detail.map(|d| d.as_str())),
                    or_dash(i.responsible_id.as_deref()),
                    format_time(i.updated_at),
                ]
            })
            .collect(),
    );
}
