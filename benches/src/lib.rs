//! Benchmark utilities for trendbar.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use trendbar_lib::{BarInstance, BarKey, Currency, Instrument, Period, Quote, RawQuote};

/// Instrument used by every benchmark.
pub const EURUSD: Instrument = Instrument::new(Currency::EUR, Currency::USD);

/// Start of the benchmark bar window.
pub fn period_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

/// The hour bar all generated quotes fall into.
pub fn bench_instance() -> BarInstance {
    BarInstance::new(BarKey::new(EURUSD, Period::Hour1), period_start())
}

/// Generates `count` quotes inside the benchmark bar, following a
/// deterministic zig-zag around 1.1.
pub fn quotes(count: usize) -> Vec<Quote> {
    (0..count)
        .map(|i| {
            let wave = ((i % 200) as f64 - 100.0) / 100_000.0;
            let offset = TimeDelta::milliseconds(1 + (i % 3_599_000) as i64);
            Quote::new(EURUSD, 1.1 + wave, period_start() + offset)
        })
        .collect()
}

/// Same as [`quotes`], in the raw feed form.
pub fn raw_quotes(count: usize) -> Vec<RawQuote> {
    quotes(count).into_iter().map(RawQuote::from).collect()
}
