//! Core types for the trendbar OHLC aggregation service.
//!
//! This crate provides the fundamental data structures used throughout trendbar:
//!
//! - [`Instrument`] - A currency pair such as `EURUSD`
//! - [`Period`] - Bar duration with wall-clock boundary alignment
//! - [`BarKey`] - A continuous stream of bars for one instrument and period
//! - [`BarInstance`] - One concrete bar window under construction
//! - [`RawQuote`] / [`Quote`] - Inbound price quote before and after validation
//! - [`BarRecord`] - The OHLC aggregation result

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trendbar/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bar;
mod error;
mod instrument;
mod period;
mod quote;
mod record;

pub use bar::{BarInstance, BarKey};
pub use error::{InstrumentParseError, QuoteError, Result, TrendbarError};
pub use instrument::{Currency, Instrument};
pub use period::{Period, PeriodParseError};
pub use quote::{Quote, RawQuote};
pub use record::{BarId, BarRecord, BarStatus};
