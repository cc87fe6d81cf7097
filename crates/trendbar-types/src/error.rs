//! Error types for trendbar.

use thiserror::Error;

use crate::PeriodParseError;

/// Result type alias for trendbar operations.
pub type Result<T> = std::result::Result<T, TrendbarError>;

/// Errors that can occur while decoding or validating trendbar data.
#[derive(Error, Debug)]
pub enum TrendbarError {
    /// A quote failed validation.
    #[error(transparent)]
    Quote(#[from] QuoteError),

    /// An instrument string could not be decoded.
    #[error(transparent)]
    Instrument(#[from] InstrumentParseError),

    /// A period identifier could not be parsed.
    #[error(transparent)]
    Period(#[from] PeriodParseError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a raw quote is rejected before routing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    /// The quote carries no price.
    #[error("quote has no price")]
    MissingPrice,

    /// The price is NaN or infinite.
    #[error("quote price is not finite: {0}")]
    NonFinitePrice(f64),

    /// The quote carries no instrument.
    #[error("quote has no instrument")]
    MissingInstrument,

    /// The timestamp is zero or negative.
    #[error("quote timestamp is unset: {0}")]
    MissingTimestamp(i64),
}

/// Data-format error for the six-character instrument encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstrumentParseError {
    /// The encoded string is not exactly six characters long.
    #[error("invalid instrument data '{value}': expected 6 characters, got {len}")]
    InvalidLength {
        /// The rejected input.
        value: String,
        /// Its length in characters.
        len: usize,
    },

    /// A currency code is not three ASCII letters.
    #[error("invalid currency code '{0}'")]
    InvalidCurrency(String),
}
