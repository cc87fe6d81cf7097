//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use trendbar_types::{BarKey, Currency, Instrument, Period};

use crate::{BatcherSettings, ConfigError};

/// What the aggregator does with a finalized bar whose save failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeFailurePolicy {
    /// Release the bar from every registry anyway; the bar is lost.
    #[default]
    ReleaseOnFailure,
    /// Keep the completed bar registered and retry the save on the next
    /// final cycle.
    RetainOnFailure,
}

/// Configuration for the aggregation pipeline.
///
/// Every field has a default, so a JSON file only needs the settings it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Instrument/period pairs to build bars for.
    pub tracked_keys: Vec<BarKey>,
    /// Pending quote count that ends a collection cycle early.
    pub execution_threshold: usize,
    /// Length of one batcher cycle (in milliseconds).
    pub cycle_budget_ms: u64,
    /// Queue poll timeout inside a cycle (in milliseconds).
    pub poll_timeout_ms: u64,
    /// Bounded wait for a component to stop before it is aborted (in milliseconds).
    pub shutdown_grace_ms: u64,
    /// Handling of persistence failures on finalization.
    pub failure_policy: FinalizeFailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let instruments = [
            Instrument::new(Currency::EUR, Currency::USD),
            Instrument::new(Currency::EUR, Currency::JPY),
        ];
        Self {
            tracked_keys: keys_for(&instruments, Period::all()),
            execution_threshold: 100,
            cycle_budget_ms: 1000,
            poll_timeout_ms: 10,
            shutdown_grace_ms: 3000,
            failure_policy: FinalizeFailurePolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Parses a configuration from JSON and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the result is invalid.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the result
    /// is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Replaces the tracked keys with every instrument/period combination.
    #[must_use]
    pub fn with_tracked(mut self, instruments: &[Instrument], periods: &[Period]) -> Self {
        self.tracked_keys = keys_for(instruments, periods);
        self
    }

    /// Checks the settings for consistency.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tracked_keys.is_empty() {
            return Err(ConfigError::NoTrackedKeys);
        }
        if self.execution_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.cycle_budget_ms == 0 {
            return Err(ConfigError::ZeroDuration("cycle budget"));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("poll timeout"));
        }
        if self.poll_timeout_ms >= self.cycle_budget_ms {
            return Err(ConfigError::PollExceedsBudget {
                poll_ms: self.poll_timeout_ms,
                budget_ms: self.cycle_budget_ms,
            });
        }
        Ok(())
    }

    /// Returns the cycle budget.
    #[must_use]
    pub const fn cycle_budget(&self) -> Duration {
        Duration::from_millis(self.cycle_budget_ms)
    }

    /// Returns the queue poll timeout.
    #[must_use]
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Returns the settings each micro-batcher runs with.
    #[must_use]
    pub const fn batcher_settings(&self) -> BatcherSettings {
        BatcherSettings {
            execution_threshold: self.execution_threshold,
            cycle_budget: self.cycle_budget(),
            poll_timeout: self.poll_timeout(),
            shutdown_grace: self.shutdown_grace(),
        }
    }
}

fn keys_for(instruments: &[Instrument], periods: &[Period]) -> Vec<BarKey> {
    instruments
        .iter()
        .flat_map(|instrument| {
            periods
                .iter()
                .map(move |period| BarKey::new(*instrument, *period))
        })
        .collect()
}
