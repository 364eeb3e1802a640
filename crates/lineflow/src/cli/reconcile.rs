//! Reconcile command - apply one operation to every serial in a file
//!
//! Ctrl-C (or SIGTERM) stops the run between chunks. Chunks already
//! committed stay committed; the summary reports what never started.

use crate::cli::context::GlobalArgs;
use crate::cli::error::{helpful, HelpfulError};
use crate::cli::output::{or_dash, print_json, print_summary, print_table};
use crate::cli::preview::read_batch_file;
use chrono::{DateTime, Utc};
use lineflow_engine::{BatchOp, BatchResult, CancellationToken, LotOptions};
use lineflow_lifecycle::Phase;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct ReconcileArgs {
    pub file: PathBuf,
    pub op: String,
    pub phase: Option<Phase>,
    pub lot: Option<String>,
    pub sku: Option<String>,
    pub priority: i64,
    pub received: Option<DateTime<Utc>>,
    pub json: bool,
}

pub fn run(global: GlobalArgs, args: ReconcileArgs) -> anyhow::Result<()> {
    let op = BatchOp::parse(&args.op, args.phase).ok_or_else(|| HelpfulError::unknown_operation(&args.op))?;
    let actor = global.actor()?;
    let (text, _) = read_batch_file(&args.file)?;

    let cancel_flag = Arc::new(AtomicBool::new(false));
    install_signal_handler(cancel_flag.clone())?;
    let cancel = CancellationToken::from_flag(cancel_flag);

    let options = LotOptions {
        number: args.lot,
        sku: args.sku,
        priority: args.priority,
        source_name: args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned()),
        received_default: args.received,
    };

    let rt = crate::cli::runtime()?;
    let result = rt.block_on(async {
        let engine = global.open_engine().await?;
        helpful(engine.reconcile(&text, op, &actor, options, &cancel).await)
    })?;

    if args.json {
        return print_json(&result);
    }
    print_result(&result);
    Ok(())
}

#[cfg(unix)]
fn install_signal_handler(flag: Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("Received signal {}, cancelling after the running chunks", sig);
            flag.store(true, Ordering::SeqCst);
        }
    });
    Ok(())
}

#[cfg(windows)]
fn install_signal_handler(flag: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C, cancelling after the running chunks");
        flag.store(true, Ordering::SeqCst);
    })?;
    Ok(())
}

fn print_result(result: &BatchResult) {
    let title = if result.cancelled {
        format!("Run {} cancelled", result.run_id)
    } else {
        format!("Run {} finished", result.run_id)
    };
    print_summary(
        &title,
        vec![
            ("operation", result.operation.clone()),
            ("lot", or_dash(result.lot_number.as_deref())),
            ("rows", result.total_rows.to_string()),
            ("accepted", result.accepted.to_string()),
            ("skipped", result.skipped.to_string()),
            ("failed", result.failed.to_string()),
            ("unmatched outbound", result.unmatched.to_string()),
            ("not processed", result.not_processed.to_string()),
        ],
    );

    if !result.errors.is_empty() {
        print_table(
            &["LINE", "SERIAL", "KIND", "MESSAGE"],
            result
                .errors
                .iter()
                .map(|e| {
                    vec![
                        e.line.to_string(),
                        or_dash(e.serial.as_deref()),
                        e.kind.to_string(),
                        e.message.clone(),
                    ]
                })
                .collect(),
        );
        if result.failed as usize > result.errors.len() {
            println!("... and {} more failed rows", result.failed as usize - result.errors.len());
        }
    }
}
