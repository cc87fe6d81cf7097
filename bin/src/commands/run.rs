//! Run command implementation.
//!
//! This module wires the pipeline to a store and a quote source, and runs
//! it until Ctrl-C or the requested duration elapses.

use crate::display::{parse_instrument, parse_period, print_bars};
use crate::simulate::run_feed;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use trendbar_lib::prelude::*;

/// Options for the run command.
pub(crate) struct RunOptions {
    pub(crate) config: Option<PathBuf>,
    pub(crate) instruments: Vec<String>,
    pub(crate) periods: Vec<String>,
    pub(crate) threshold: Option<usize>,
    pub(crate) cycle_ms: Option<u64>,
    pub(crate) store: Option<PathBuf>,
    pub(crate) memory: bool,
    pub(crate) simulate: bool,
    pub(crate) rate_ms: u64,
    pub(crate) duration: Option<u64>,
    pub(crate) quiet: bool,
}

/// Build the pipeline configuration from the config file and CLI overrides.
fn build_config(opts: &RunOptions) -> Result<PipelineConfig> {
    let mut config = match &opts.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if !opts.instruments.is_empty() || !opts.periods.is_empty() {
        let mut instruments = opts
            .instruments
            .iter()
            .map(|s| parse_instrument(s))
            .collect::<Result<Vec<_>>>()?;
        if instruments.is_empty() {
            instruments = config.tracked_keys.iter().map(|key| key.instrument).collect();
            instruments.sort();
            instruments.dedup();
        }

        let mut periods = opts
            .periods
            .iter()
            .map(|s| parse_period(s))
            .collect::<Result<Vec<_>>>()?;
        if periods.is_empty() {
            periods = Period::all().to_vec();
        }

        config = config.with_tracked(&instruments, &periods);
    }

    if let Some(threshold) = opts.threshold {
        config.execution_threshold = threshold;
    }
    if let Some(cycle_ms) = opts.cycle_ms {
        config.cycle_budget_ms = cycle_ms;
    }

    config.validate().context("Invalid pipeline configuration")?;
    Ok(config)
}

/// Read newline-delimited JSON quotes from stdin into the feed.
async fn read_stdin(feed: QuoteFeed) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RawQuote>(line) {
            Ok(quote) => {
                if feed.send(quote).is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed quote line"),
        }
    }

    tracing::info!("stdin closed");
    Ok(())
}

/// Run the pipeline.
pub(crate) async fn run(opts: RunOptions) -> Result<()> {
    let config = build_config(&opts)?;

    let memory_store = opts.memory.then(|| Arc::new(InMemoryBarStore::new()));
    let store: Arc<dyn BarStore> = match &memory_store {
        Some(store) => store.clone(),
        None => {
            let dir = opts.store.clone().unwrap_or_else(FileBarStore::default_path);
            let store = FileBarStore::new(dir.clone())
                .with_context(|| format!("Failed to open bar store at {}", dir.display()))?;
            tracing::info!(path = %dir.display(), "persisting bars to disk");
            Arc::new(store)
        }
    };

    let mut instruments: Vec<Instrument> =
        config.tracked_keys.iter().map(|key| key.instrument).collect();
    instruments.sort();
    instruments.dedup();

    let service = TrendBarService::new(config, store, Arc::new(SystemClock))?;
    let feed = service.start();

    let source: JoinHandle<()> = if opts.simulate {
        tokio::spawn(run_feed(
            feed,
            instruments,
            Duration::from_millis(opts.rate_ms),
        ))
    } else {
        tokio::spawn(async move {
            if let Err(e) = read_stdin(feed).await {
                tracing::error!(error = %e, "failed to read quotes from stdin");
            }
        })
    };

    match opts.duration {
        Some(secs) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => result?,
                () = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    source.abort();
    service.shutdown().await;

    if !opts.quiet {
        let stats = service.router().stats();
        println!(
            "Routed {} quotes ({} rejected, {} unmatched)",
            stats.routed(),
            stats.rejected(),
            stats.unmatched()
        );
        if let Some(store) = memory_store {
            print_bars(&store.records());
        }
    }

    Ok(())
}
