//! Lineflow command line
//!
//! One binary for the whole item lifecycle: seeding catalogs, previewing and
//! reconciling operator batch files, interactive transitions, scrap output
//! lots, audit queries and lot administration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use lineflow_lifecycle::Phase;
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

use cli::context::GlobalArgs;
use cli::{parse_day, parse_phase};

#[derive(Parser, Debug)]
#[command(name = "lineflow", version, about = "Item lifecycle tracking and batch reconciliation")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// SQLite database file
    #[arg(long, global = true, env = "LINEFLOW_DB")]
    db: Option<PathBuf>,

    /// Config file (defaults to ~/.lineflow/config.toml)
    #[arg(long, global = true, env = "LINEFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Acting user id
    #[arg(long, global = true, env = "LINEFLOW_USER")]
    user: Option<String>,

    /// Acting user's role (UA, UReg, UTI, UEN, UR, UE, URep)
    #[arg(long, global = true, env = "LINEFLOW_ROLE")]
    role: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the state, code and SKU catalogs (idempotent)
    Seed,

    /// Show how a batch file would be read, without touching the database
    Preview {
        /// Batch file to inspect
        file: PathBuf,

        /// Number of parsed rows to show
        #[arg(short = 'n', long, default_value = "10")]
        rows: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply one operation to every serial in a batch file
    Reconcile {
        /// Batch file (CSV, TSV, space-aligned or a bare serial list)
        file: PathBuf,

        /// Operation: create, advance, set-phase, pack, pair, ship
        #[arg(long)]
        op: String,

        /// Target phase for set-phase
        #[arg(long, value_parser = parse_phase)]
        phase: Option<Phase>,

        /// Lot number (defaults to LOT_YYMMDD or SAL_YYMMDD)
        #[arg(long)]
        lot: Option<String>,

        /// SKU for the lot and its new items
        #[arg(long)]
        sku: Option<String>,

        /// Lot priority, 1 (low) to 3 (high)
        #[arg(long, default_value = "2", value_parser = clap::value_parser!(i64).range(1..=3))]
        priority: i64,

        /// Received date for rows without one (e.g. 2024-03-15 or 15-mar-24)
        #[arg(long, value_parser = parse_day)]
        received: Option<chrono::DateTime<chrono::Utc>>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move one item to another phase
    Transition {
        /// Item serial
        serial: String,

        /// Target phase
        #[arg(long, value_parser = parse_phase)]
        to: Phase,

        /// Scrap motive (COSMETICA, FUERA_DE_RANGO, INFESTADO, DEFECTO_SW, ...)
        #[arg(long)]
        motive: Option<String>,

        /// Scrap detail
        #[arg(long)]
        detail: Option<String>,

        /// Diagnosis code backing an electronic scrap motive
        #[arg(long)]
        diagnosis_code: Option<String>,

        /// Record a diagnosis with these codes
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        diagnose: Vec<String>,

        /// Close a repair with these repair codes
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        repair: Vec<String>,

        /// Responsible technician for diagnosis and repair
        #[arg(long)]
        technician: Option<String>,

        /// Free-text note or observations
        #[arg(long)]
        note: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ship a scrapped item out in a scrap lot
    ScrapOut {
        /// Item serial
        serial: String,

        /// Physical condition (CIRCUITO_OK_BASE_NOK, BASE_OK_CIRCUITO_NOK, ...)
        #[arg(long)]
        detail: String,

        /// Existing scrap lot to use instead of the open one for this motive
        #[arg(long)]
        lot: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List items in a phase
    List {
        #[arg(long, value_parser = parse_phase)]
        phase: Phase,

        /// Only items in this inbound lot
        #[arg(long)]
        lot: Option<String>,

        #[arg(long)]
        sku: Option<String>,

        /// Only items with this scrap motive
        #[arg(long)]
        motive: Option<String>,

        #[arg(short = 'n', long, default_value = "100")]
        limit: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read the transition log, newest first
    History {
        #[arg(long)]
        serial: Option<String>,

        #[arg(long, value_parser = parse_phase)]
        phase: Option<Phase>,

        /// Only records on or after this day
        #[arg(long, value_parser = parse_day)]
        since: Option<chrono::DateTime<chrono::Utc>>,

        /// Only records before this day
        #[arg(long, value_parser = parse_day)]
        until: Option<chrono::DateTime<chrono::Utc>>,

        #[arg(short = 'n', long, default_value = "50")]
        limit: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnosis and repair entries for one item
    RepairHistory {
        serial: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Items waiting at the repair bench
    RepairQueue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// SCRAP inventory by motive, detail and SKU
    ScrapStats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recent reconcile runs
    Runs {
        #[arg(short = 'n', long, default_value = "20")]
        limit: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Lot administration
    Lot {
        #[command(subcommand)]
        action: LotAction,
    },
}

#[derive(Subcommand, Debug)]
enum LotAction {
    /// List lots, newest first
    List {
        #[arg(short = 'n', long)]
        limit: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a lot COMPLETADO
    Close {
        number: String,
    },

    /// Remove a lot and its items from view; transition records are kept
    Purge {
        number: String,

        /// Repeat the lot number to confirm
        #[arg(long)]
        confirm: String,
    },
}

fn run_command(cli: Cli) -> Result<()> {
    let global = GlobalArgs {
        db: cli.db,
        config: cli.config,
        user: cli.user,
        role: cli.role,
    };

    match cli.command {
        Commands::Seed => cli::seed::run(global),
        Commands::Preview { file, rows, json } => {
            cli::preview::run(global, cli::preview::PreviewArgs { file, rows, json })
        }
        Commands::Reconcile {
            file,
            op,
            phase,
            lot,
            sku,
            priority,
            received,
            json,
        } => cli::reconcile::run(
            global,
            cli::reconcile::ReconcileArgs {
                file,
                op,
                phase,
                lot,
                sku,
                priority,
                received,
                json,
            },
        ),
        Commands::Transition {
            serial,
            to,
            motive,
            detail,
            diagnosis_code,
            diagnose,
            repair,
            technician,
            note,
            json,
        } => cli::transition::run(
            global,
            cli::transition::TransitionArgs {
                serial,
                to,
                motive,
                detail,
                diagnosis_code,
                diagnose,
                repair,
                technician,
                note,
                json,
            },
        ),
        Commands::ScrapOut {
            serial,
            detail,
            lot,
            json,
        } => cli::scrap_out::run(
            global,
            cli::scrap_out::ScrapOutArgs {
                serial,
                detail,
                lot,
                json,
            },
        ),
        Commands::List {
            phase,
            lot,
            sku,
            motive,
            limit,
            json,
        } => cli::list::run(
            global,
            cli::list::ListArgs {
                phase,
                lot,
                sku,
                motive,
                limit,
                json,
            },
        ),
        Commands::History {
            serial,
            phase,
            since,
            until,
            limit,
            json,
        } => cli::history::run(
            global,
            cli::history::HistoryArgs {
                serial,
                phase,
                since,
                until,
                limit,
                json,
            },
        ),
        Commands::RepairHistory { serial, json } => cli::repair::run_history(global, &serial, json),
        Commands::RepairQueue { json } => cli::repair::run_queue(global, json),
        Commands::ScrapStats { json } => cli::scrap_stats::run(global, json),
        Commands::Runs { limit, json } => cli::runs::run(global, limit, json),
        Commands::Lot { action } => match action {
            LotAction::List { limit, json } => cli::lot::run_list(global, limit, json),
            LotAction::Close { number } => cli::lot::run_close(global, &number),
            LotAction::Purge { number, confirm } => cli::lot::run_purge(global, &number, &confirm),
        },
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = lineflow_logging::init_logging(lineflow_logging::LogConfig {
        app_name: "lineflow",
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: logging disabled: {:#}", err);
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}
