//! Bar identity: the stream key and the concrete window being built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Instrument, Period, Quote};

/// Identifies a continuous stream of bars for one instrument and period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BarKey {
    /// The instrument the bars are built for.
    pub instrument: Instrument,
    /// The bar duration.
    pub period: Period,
}

impl BarKey {
    /// Creates a new bar key.
    #[must_use]
    pub const fn new(instrument: Instrument, period: Period) -> Self {
        Self { instrument, period }
    }

    /// Returns the bar instance whose window contains `instant`.
    #[must_use]
    pub fn instance_at(&self, instant: DateTime<Utc>) -> BarInstance {
        BarInstance::new(*self, self.period.start_of(instant))
    }
}

impl std::fmt::Display for BarKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.instrument, self.period)
    }
}

/// One concrete bar window under construction.
///
/// A plain value: two instances are equal when their key and period start
/// are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BarInstance {
    /// The bar stream this window belongs to.
    pub key: BarKey,
    /// Start of the window (inclusive boundary).
    pub period_start: DateTime<Utc>,
}

impl BarInstance {
    /// Creates a new bar instance.
    #[must_use]
    pub const fn new(key: BarKey, period_start: DateTime<Utc>) -> Self {
        Self { key, period_start }
    }

    /// Returns the end of the window.
    #[must_use]
    pub fn period_end(&self) -> DateTime<Utc> {
        self.period_start + self.key.period.delta()
    }

    /// Returns true if `quote` belongs to this bar.
    ///
    /// Both window bounds are exclusive: a quote stamped exactly on a
    /// period boundary belongs to neither neighbouring bar.
    #[must_use]
    pub fn accepts(&self, quote: &Quote) -> bool {
        quote.instrument == self.key.instrument
            && quote.timestamp > self.period_start
            && quote.timestamp < self.period_end()
    }

    /// Returns true once `now` is past the end of the window.
    #[must_use]
    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        now > self.period_end()
    }
}

impl std::fmt::Display for BarInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}",
            self.key,
            self.period_start.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}
