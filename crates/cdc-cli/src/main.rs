use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

mod commands;

/// Exit status for "merge persisted, quality gate failed".
const EXIT_GATE_FAILED_AFTER_MERGE: u8 = 3;

#[derive(Parser)]
#[command(name = "cdc")]
#[command(about = "CDC current-state reconciliation pipeline", long_about = None)]
struct Cli {
    /// Project root; relative data paths resolve against it.
    #[arg(long, global = true, default_value = ".")]
    project_root: PathBuf,

    /// Layered config paths in merge order (repeatable).
    #[arg(long = "config", global = true)]
    config_paths: Vec<PathBuf>,

    /// Fail instead of warn when the config carries keys nothing reads.
    #[arg(long, global = true, default_value_t = false)]
    strict_config: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a JSON Lines event batch into current state and print the merge report.
    Merge {
        #[arg(long)]
        events: PathBuf,
    },

    /// Run the quality gate over current state.
    Check {
        /// Processed-event count to judge against recent history.
        #[arg(long)]
        processed: u64,
    },

    /// Full run for one date: merge, quality gate, metrics record.
    Run {
        /// Run date (YYYY-MM-DD).
        #[arg(long)]
        date: NaiveDate,

        /// Event batch; defaults to the bronze partition for the date.
        #[arg(long)]
        events: Option<PathBuf>,

        /// Land the --events batch in the bronze partition before running.
        #[arg(long, default_value_t = false, requires = "events")]
        land: bool,
    },

    /// Run every date in [start, end] from bronze partitions.
    Backfill {
        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,
    },

    /// Print recent run metrics, oldest first.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Compute layered config hash + print canonical JSON.
    ConfigHash {
        /// Paths in merge order.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let (class, code) = commands::classify(&e);
            eprintln!("error[{class}]: {e:#}");
            if code == EXIT_GATE_FAILED_AFTER_MERGE {
                eprintln!("state was persisted before the gate failed; inspect it before the next run");
            }
            ExitCode::from(code)
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        project_root,
        config_paths,
        strict_config,
        cmd,
    } = cli;
    // config-hash hashes its own paths and never reads the global layers.
    let load = || commands::Context::load(&project_root, &config_paths, strict_config);

    match cmd {
        Commands::Merge { events } => commands::run::merge(&load()?, &events),
        Commands::Check { processed } => commands::run::check(&load()?, processed),
        Commands::Run { date, events, land } => {
            commands::run::run(&load()?, date, events.as_deref(), land)
        }
        Commands::Backfill { start, end } => commands::run::backfill(&load()?, start, end),
        Commands::History { limit } => commands::history(&load()?, limit),
        Commands::ConfigHash { paths } => commands::config_hash(&paths),
    }
}

/// Logs go to stderr; stdout carries only command output.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
