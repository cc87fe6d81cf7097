//! trendbar CLI - live OHLC trend bar aggregation.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod simulate;

#[derive(Parser)]
#[command(name = "trendbar")]
#[command(about = "Live OHLC trend bar aggregation for FX quote streams", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the aggregation pipeline until Ctrl-C
    Run {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Instrument to track (repeatable, e.g. -i EURUSD -i EURJPY)
        #[arg(short, long = "instrument")]
        instruments: Vec<String>,

        /// Period to track (repeatable: m1, h1, d1)
        #[arg(short, long = "period")]
        periods: Vec<String>,

        /// Quote count that triggers an early batch
        #[arg(long)]
        threshold: Option<usize>,

        /// Batcher cycle budget in milliseconds
        #[arg(long)]
        cycle_ms: Option<u64>,

        /// Directory for persisted bars. Defaults to the platform data dir.
        #[arg(long, conflicts_with = "memory")]
        store: Option<PathBuf>,

        /// Keep bars in memory and print them on exit
        #[arg(long)]
        memory: bool,

        /// Feed a random-walk quote stream instead of reading stdin
        #[arg(long)]
        simulate: bool,

        /// Milliseconds between simulated quotes
        #[arg(long, default_value = "250")]
        rate_ms: u64,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Show persisted bars
    History {
        /// Instrument (e.g. EURUSD)
        instrument: String,

        /// Bar period (m1, h1, d1)
        #[arg(short, long, default_value = "m1")]
        period: String,

        /// Range start (RFC 3339 or YYYY-MM-DD). Defaults to 24 hours ago.
        #[arg(long)]
        from: Option<String>,

        /// Range end (RFC 3339 or YYYY-MM-DD). Open-ended when omitted.
        #[arg(long)]
        to: Option<String>,

        /// Directory of persisted bars. Defaults to the platform data dir.
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// List supported bar periods
    Periods,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    init_tracing(cli.verbose, cli.quiet);

    match command {
        Commands::Run {
            config,
            instruments,
            periods,
            threshold,
            cycle_ms,
            store,
            memory,
            simulate,
            rate_ms,
            duration,
        } => {
            commands::run::run(commands::run::RunOptions {
                config,
                instruments,
                periods,
                threshold,
                cycle_ms,
                store,
                memory,
                simulate,
                rate_ms,
                duration,
                quiet: cli.quiet,
            })
            .await
        }
        Commands::History {
            instrument,
            period,
            from,
            to,
            store,
        } => commands::history::history(
            &instrument,
            &period,
            from.as_deref(),
            to.as_deref(),
            store,
        ),
        Commands::Periods => {
            commands::periods::list_periods();
            Ok(())
        }
    }
}
