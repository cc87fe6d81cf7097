//! The storage interface used by the aggregation pipeline.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use trendbar_types::{BarRecord, Instrument, Period};

use crate::Result;

/// Persistence collaborator for trend bars.
///
/// Implementations are called from blocking contexts and may perform
/// synchronous I/O.
pub trait BarStore: std::fmt::Debug + Send + Sync {
    /// Saves a bar and returns the stored record.
    ///
    /// A record without an identifier is assigned a fresh one. Saving a bar
    /// whose window is already stored replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if the bar cannot be persisted.
    fn save(&self, record: BarRecord) -> Result<BarRecord>;

    /// Returns stored bars with `from <= period_start <= to`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored bars cannot be read.
    fn find_range(
        &self,
        instrument: Instrument,
        period: Period,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BarRecord>>;
}

impl<S: BarStore + ?Sized> BarStore for Arc<S> {
    fn save(&self, record: BarRecord) -> Result<BarRecord> {
        (**self).save(record)
    }

    fn find_range(
        &self,
        instrument: Instrument,
        period: Period,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BarRecord>> {
        (**self).find_range(instrument, period, from, to)
    }
}
