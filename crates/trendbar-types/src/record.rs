//! OHLC trend bar records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BarInstance, BarKey, Instrument, Period, Quote};

/// Unique identifier assigned to a bar by the store.
pub type BarId = Uuid;

/// Lifecycle status of a bar record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BarStatus {
    /// The bar window is still open.
    #[default]
    Incomplete,
    /// The bar has been closed and carries a close price.
    Completed,
}

impl BarStatus {
    /// Returns true if the bar has been closed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns the status as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Incomplete => "incomplete",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for BarStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Accumulated OHLC state for one bar window.
///
/// Records are values: every update returns a new record and leaves the
/// original untouched. `high` and `low` track the extremes of every price
/// folded in so far, and `close` stays unset until the bar is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarRecord {
    /// Store-assigned identifier, unset until the first save.
    pub id: Option<BarId>,
    /// The instrument the bar was built for.
    pub instrument: Instrument,
    /// Price of the first quote received for the window.
    pub open: f64,
    /// Highest price seen.
    pub high: f64,
    /// Lowest price seen.
    pub low: f64,
    /// Price of the last quote of the window, set on finalization.
    pub close: Option<f64>,
    /// The bar duration.
    pub period: Period,
    /// Start of the bar window.
    pub period_start: DateTime<Utc>,
    /// Lifecycle status.
    pub status: BarStatus,
}

impl BarRecord {
    /// Opens a record from the first non-empty batch of a window.
    ///
    /// The open price is the first quote in arrival order. Returns `None`
    /// when `batch` is empty.
    #[must_use]
    pub fn open(instance: &BarInstance, batch: &[Quote]) -> Option<Self> {
        let first = batch.first()?;
        let record = Self {
            id: None,
            instrument: instance.key.instrument,
            open: first.price,
            high: first.price,
            low: first.price,
            close: None,
            period: instance.key.period,
            period_start: instance.period_start,
            status: BarStatus::Incomplete,
        };
        Some(record.with_batch(&batch[1..]))
    }

    /// Returns the record with the extremes of `batch` folded in.
    #[must_use]
    pub fn with_batch(&self, batch: &[Quote]) -> Self {
        let (high, low) = batch
            .iter()
            .fold((self.high, self.low), |(high, low), quote| {
                (high.max(quote.price), low.min(quote.price))
            });
        Self { high, low, ..*self }
    }

    /// Returns the completed record after folding in the final batch.
    ///
    /// The close is the last price of `batch`, or the open when the final
    /// batch is empty.
    #[must_use]
    pub fn finalized(&self, batch: &[Quote]) -> Self {
        let close = batch.last().map_or(self.open, |quote| quote.price);
        Self {
            close: Some(close),
            status: BarStatus::Completed,
            ..self.with_batch(batch)
        }
    }

    /// Returns the record carrying the given identifier.
    #[must_use]
    pub const fn with_id(self, id: BarId) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    /// Returns the bar stream this record belongs to.
    #[must_use]
    pub const fn key(&self) -> BarKey {
        BarKey::new(self.instrument, self.period)
    }

    /// Returns the bar window this record belongs to.
    #[must_use]
    pub const fn instance(&self) -> BarInstance {
        BarInstance::new(self.key(), self.period_start)
    }

    /// Returns true if the record has been finalized.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// Returns the price range (high - low).
    #[must_use]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Returns the body size (|close - open|), once closed.
    #[must_use]
    pub fn body(&self) -> Option<f64> {
        self.close.map(|close| (close - self.open).abs())
    }

    /// Returns true if the bar closed above its open.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close.is_some_and(|close| close > self.open)
    }

    /// Returns true if the bar closed below its open.
    #[must_use]
    pub fn is_bearish(&self) -> bool {
        self.close.is_some_and(|close| close < self.open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Currency;
    use approx::assert_relative_eq;
    use chrono::{TimeDelta, TimeZone};

    const EURUSD: Instrument = Instrument::new(Currency::EUR, Currency::USD);

    fn instance() -> BarInstance {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        BarInstance::new(BarKey::new(EURUSD, Period::Minute1), start)
    }

    fn quotes(prices: &[f64]) -> Vec<Quote> {
        let start = instance().period_start;
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| {
                Quote::new(EURUSD, *price, start + TimeDelta::seconds(i as i64 + 1))
            })
            .collect()
    }

    #[test]
    fn test_open_from_first_batch() {
        let record = BarRecord::open(&instance(), &quotes(&[1.2222, 1.1111, 1.3333])).unwrap();

        assert_relative_eq!(record.open, 1.2222);
        assert_relative_eq!(record.high, 1.3333);
        assert_relative_eq!(record.low, 1.1111);
        assert_eq!(record.close, None);
        assert_eq!(record.status, BarStatus::Incomplete);
        assert_eq!(record.period_start, instance().period_start);
        assert_eq!(record.id, None);
    }

    #[test]
    fn test_open_empty_batch() {
        assert!(BarRecord::open(&instance(), &[]).is_none());
    }

    #[test]
    fn test_open_uses_arrival_order() {
        let mut batch = quotes(&[1.5, 1.4]);
        batch.swap(0, 1);
        let record = BarRecord::open(&instance(), &batch).unwrap();
        assert_relative_eq!(record.open, 1.4);
    }

    #[test]
    fn test_finalized_with_batch() {
        let record = BarRecord::open(&instance(), &quotes(&[1.2222, 1.1111, 1.3333])).unwrap();
        let done = record.finalized(&quotes(&[1.0000, 1.4444]));

        assert_relative_eq!(done.open, 1.2222);
        assert_relative_eq!(done.high, 1.4444);
        assert_relative_eq!(done.low, 1.0000);
        assert_relative_eq!(done.close.unwrap(), 1.4444);
        assert_eq!(done.status, BarStatus::Completed);

        // the source record is unchanged
        assert_eq!(record.status, BarStatus::Incomplete);
    }

    #[test]
    fn test_finalized_empty_batch() {
        let record = BarRecord::open(&instance(), &quotes(&[1.2, 1.3])).unwrap();
        let done = record.finalized(&[]);

        assert_relative_eq!(done.close.unwrap(), 1.2);
        assert_relative_eq!(done.high, 1.3);
        assert!(done.is_completed());
    }

    #[test]
    fn test_with_batch_extremes_monotonic() {
        let record = BarRecord::open(&instance(), &quotes(&[1.2])).unwrap();
        let record = record.with_batch(&quotes(&[1.25, 1.15]));
        let record = record.with_batch(&quotes(&[1.21]));
        let record = record.with_batch(&[]);

        assert_relative_eq!(record.high, 1.25);
        assert_relative_eq!(record.low, 1.15);
    }

    #[test]
    fn test_helpers() {
        let record = BarRecord::open(&instance(), &quotes(&[1.1000, 1.1050, 1.0980])).unwrap();
        assert!(record.body().is_none());
        assert!(!record.is_bullish());

        let done = record.finalized(&quotes(&[1.1020]));
        assert!((done.range() - 0.0070).abs() < 1e-10);
        assert!((done.body().unwrap() - 0.0020).abs() < 1e-10);
        assert!(done.is_bullish());
        assert!(!done.is_bearish());
        assert_eq!(done.instance(), instance());
    }

    #[test]
    fn test_with_id_and_serde() {
        let id = Uuid::new_v4();
        let record = BarRecord::open(&instance(), &quotes(&[1.1]))
            .unwrap()
            .finalized(&[])
            .with_id(id);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"instrument\":\"EURUSD\""));
        assert!(json.contains("\"status\":\"completed\""));
        assert!(json.contains("\"period\":\"m1\""));

        let back: BarRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.id, Some(id));
    }
}
