//! Argument parsing helpers and table output for the trendbar CLI.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use trendbar_lib::prelude::*;

/// Parse an instrument argument such as `EURUSD`.
pub(crate) fn parse_instrument(s: &str) -> Result<Instrument> {
    s.parse()
        .with_context(|| format!("Invalid instrument: {s}"))
}

/// Parse a period argument such as `m1`.
pub(crate) fn parse_period(s: &str) -> Result<Period> {
    s.parse().with_context(|| format!("Invalid period: {s}"))
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date (midnight UTC).
pub(crate) fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") else {
        bail!("Invalid time: {s}. Expected RFC 3339 or YYYY-MM-DD");
    };
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .with_context(|| format!("Invalid time: {s}"))
}

/// Print bars as a table.
pub(crate) fn print_bars(bars: &[BarRecord]) {
    if bars.is_empty() {
        println!("No bars found.");
        return;
    }

    println!(
        "{:<8} {:<6} {:<20} {:>12} {:>12} {:>12} {:>12} {:<10}",
        "SYMBOL", "PERIOD", "START", "OPEN", "HIGH", "LOW", "CLOSE", "STATUS"
    );
    println!("{}", "-".repeat(98));

    for bar in bars {
        let close = bar
            .close
            .map_or_else(|| "-".to_string(), |close| format!("{close:.5}"));
        println!(
            "{:<8} {:<6} {:<20} {:>12.5} {:>12.5} {:>12.5} {:>12} {:<10}",
            bar.instrument.to_string(),
            bar.period.as_str(),
            bar.period_start.format("%Y-%m-%d %H:%M:%S").to_string(),
            bar.open,
            bar.high,
            bar.low,
            close,
            bar.status.as_str(),
        );
    }

    println!("\nTotal: {} bars", bars.len());
}
