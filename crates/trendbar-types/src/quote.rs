//! Inbound price quotes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Instrument, QuoteError};

/// A quote as it arrives from the feed, before validation.
///
/// Timestamps are epoch milliseconds. Fields the feed may omit are optional;
/// a missing timestamp decodes as zero and is rejected by [`Self::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    /// The quoted instrument.
    pub instrument: Option<Instrument>,
    /// The quoted price.
    pub price: Option<f64>,
    /// Quote time in milliseconds since the Unix epoch, zero when unset.
    #[serde(default)]
    pub timestamp: i64,
}

impl RawQuote {
    /// Creates a fully populated raw quote.
    #[must_use]
    pub const fn new(instrument: Instrument, price: f64, timestamp: i64) -> Self {
        Self {
            instrument: Some(instrument),
            price: Some(price),
            timestamp,
        }
    }

    /// Validates the raw quote.
    ///
    /// # Errors
    ///
    /// Returns an error when the price is missing or not finite, the
    /// instrument is missing, or the timestamp is not positive.
    pub fn validate(&self) -> Result<Quote, QuoteError> {
        let price = self.price.ok_or(QuoteError::MissingPrice)?;
        if !price.is_finite() {
            return Err(QuoteError::NonFinitePrice(price));
        }
        let instrument = self.instrument.ok_or(QuoteError::MissingInstrument)?;
        if self.timestamp <= 0 {
            return Err(QuoteError::MissingTimestamp(self.timestamp));
        }
        let timestamp = DateTime::from_timestamp_millis(self.timestamp)
            .ok_or(QuoteError::MissingTimestamp(self.timestamp))?;

        Ok(Quote::new(instrument, price, timestamp))
    }
}

impl From<Quote> for RawQuote {
    fn from(quote: Quote) -> Self {
        Self::new(
            quote.instrument,
            quote.price,
            quote.timestamp.timestamp_millis(),
        )
    }
}

/// A validated price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// The quoted instrument.
    pub instrument: Instrument,
    /// The quoted price, always finite.
    pub price: f64,
    /// Quote time.
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Creates a new quote.
    #[must_use]
    pub const fn new(instrument: Instrument, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            instrument,
            price,
            timestamp,
        }
    }
}
