//! Live OHLC aggregation pipeline for trendbar.
//!
//! This crate wires the moving parts that turn a quote stream into
//! persisted trend bars:
//!
//! - [`QuoteRouter`] - Fans validated quotes into the queues of active bars
//! - [`PeriodScheduler`] - One wall-clock aligned timer per tracked key
//! - [`BarBuilder`] - Opens the next bar and attaches its batcher
//! - [`MicroBatcher`] - Per-bar collect/dispatch cycle with period-end detection
//! - [`BarAggregator`] - Folds batches into records and finalizes them
//! - [`BarRegistry`] - Shared per-bar state
//! - [`TrendBarService`] - Composition root with ordered shutdown

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/trendbar/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod aggregator;
mod batcher;
mod builder;
mod clock;
mod config;
mod error;
mod queue;
mod registry;
mod router;
mod scheduler;
mod service;

pub use aggregator::BarAggregator;
pub use batcher::{BatchSink, BatcherSettings, BatcherState, MicroBatcher};
pub use builder::BarBuilder;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FinalizeFailurePolicy, PipelineConfig};
pub use error::{ConfigError, PipelineError, Result};
pub use queue::QuoteQueue;
pub use registry::{BarRegistry, ScheduleState};
pub use router::{QuoteFeed, QuoteRouter, RouterStats};
pub use scheduler::PeriodScheduler;
pub use service::TrendBarService;
