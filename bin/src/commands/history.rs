//! History command implementation.
//!
//! This module handles reading persisted bars back from the file store.

use crate::display::{parse_instrument, parse_period, parse_time, print_bars};
use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use trendbar_lib::prelude::*;

/// Print persisted bars of one instrument and period.
pub(crate) fn history(
    instrument_str: &str,
    period_str: &str,
    from_str: Option<&str>,
    to_str: Option<&str>,
    store_dir: Option<PathBuf>,
) -> Result<()> {
    let instrument = parse_instrument(instrument_str)?;
    let period = parse_period(period_str)?;

    let from = match from_str {
        Some(s) => parse_time(s)?,
        None => Utc::now() - TimeDelta::days(1),
    };
    let to = to_str.map(parse_time).transpose()?;

    let store_dir = store_dir.unwrap_or_else(FileBarStore::default_path);
    let store = FileBarStore::new(store_dir.clone())
        .with_context(|| format!("Failed to open bar store at {}", store_dir.display()))?;

    let history = BarHistory::new(Arc::new(store));
    let bars = history.bars_in_range(instrument, period, from, to)?;

    print_bars(&bars);
    Ok(())
}
