//! Read path over stored bars.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use trendbar_types::{BarRecord, Instrument, Period};

use crate::{BarStore, Result};

/// Queries stored bars by instrument, period and time range.
#[derive(Debug, Clone)]
pub struct BarHistory {
    store: Arc<dyn BarStore>,
}

impl BarHistory {
    /// Creates a history view over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn BarStore>) -> Self {
        Self { store }
    }

    /// Returns bars whose period start lies in `[from, to]`, oldest first.
    ///
    /// A `to` of `None` leaves the range open-ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn bars_in_range(
        &self,
        instrument: Instrument,
        period: Period,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<BarRecord>> {
        let to = to.unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.store.find_range(instrument, period, from, to)
    }

    /// Returns every bar starting at or after `from`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn bars_from(
        &self,
        instrument: Instrument,
        period: Period,
        from: DateTime<Utc>,
    ) -> Result<Vec<BarRecord>> {
        self.bars_in_range(instrument, period, from, None)
    }
}
