//! Live OHLC trend bar aggregation for FX quote streams.
//!
//! This is a facade crate that re-exports functionality from the trendbar
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use trendbar_lib::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryBarStore::new());
//!     let service = TrendBarService::new(
//!         PipelineConfig::default(),
//!         store.clone(),
//!         Arc::new(SystemClock),
//!     )?;
//!
//!     let feed = service.start();
//!     feed.send(RawQuote::new("EURUSD".parse()?, 1.0842, 1_704_110_460_000))?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     service.shutdown().await;
//!     println!("{} bars persisted", store.len());
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trendbar/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use trendbar_types::*;

// Re-export storage
#[cfg(feature = "store")]
pub use trendbar_store::{BarHistory, BarStore, FileBarStore, InMemoryBarStore, StoreError};

// Re-export the pipeline
#[cfg(feature = "pipeline")]
pub use trendbar_pipeline::{
    BarAggregator, BarBuilder, BarRegistry, BatchSink, BatcherSettings, BatcherState, Clock,
    ConfigError, FinalizeFailurePolicy, ManualClock, MicroBatcher, PeriodScheduler,
    PipelineConfig, PipelineError, QuoteFeed, QuoteQueue, QuoteRouter, RouterStats,
    ScheduleState, SystemClock, TrendBarService,
};

/// Prelude module for convenient imports.
///
/// ```
/// use trendbar_lib::prelude::*;
/// ```
pub mod prelude {
    pub use trendbar_types::{
        BarId, BarInstance, BarKey, BarRecord, BarStatus, Currency, Instrument, Period, Quote,
        RawQuote, TrendbarError,
    };

    #[cfg(feature = "store")]
    pub use trendbar_store::{BarHistory, BarStore, FileBarStore, InMemoryBarStore};

    #[cfg(feature = "pipeline")]
    pub use trendbar_pipeline::{
        Clock, FinalizeFailurePolicy, PipelineConfig, PipelineError, QuoteFeed, SystemClock,
        TrendBarService,
    };
}
