//! Error types for the aggregation pipeline.

use std::path::PathBuf;
use thiserror::Error;
use trendbar_store::StoreError;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the running pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A finalized bar could not be saved.
    #[error("Failed to persist bar {instance}: {source}")]
    Persist {
        /// The bar window that failed to persist.
        instance: String,
        /// True if the bar stayed registered for a retry.
        retained: bool,
        /// The underlying store error.
        source: StoreError,
    },

    /// A batch could not be delivered to the aggregator.
    #[error("Batch dispatch failed: {0}")]
    Dispatch(String),

    /// The quote feed is closed because the router has stopped.
    #[error("Quote feed is closed")]
    FeedClosed,
}

impl PipelineError {
    /// Returns true if the bar was kept registered after the failure.
    #[must_use]
    pub const fn is_retained(&self) -> bool {
        matches!(self, Self::Persist { retained: true, .. })
    }
}

/// Errors from loading or validating a [`PipelineConfig`](crate::PipelineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the configuration.
    #[error("Failed to parse config: {0}")]
    ParseJson(#[from] serde_json::Error),

    /// The execution threshold is zero.
    #[error("execution threshold must be at least 1")]
    ZeroThreshold,

    /// A duration setting is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// The poll timeout does not fit inside the cycle budget.
    #[error("poll timeout ({poll_ms} ms) must be shorter than the cycle budget ({budget_ms} ms)")]
    PollExceedsBudget {
        /// Configured poll timeout.
        poll_ms: u64,
        /// Configured cycle budget.
        budget_ms: u64,
    },

    /// No bar key is tracked.
    #[error("no instrument/period pair is tracked")]
    NoTrackedKeys,
}
