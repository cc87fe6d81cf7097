//! Opening new bars.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use trendbar_types::{BarInstance, BarKey};

use crate::{BarAggregator, BarRegistry, BatchSink, BatcherSettings, Clock, MicroBatcher};

/// Creates the bar of the current period for a key and attaches its
/// micro-batcher.
#[derive(Debug)]
pub struct BarBuilder {
    registry: Arc<BarRegistry>,
    aggregator: Arc<BarAggregator>,
    clock: Arc<dyn Clock>,
    settings: BatcherSettings,
}

impl BarBuilder {
    /// Creates a builder whose batchers feed `aggregator`.
    #[must_use]
    pub fn new(
        registry: Arc<BarRegistry>,
        aggregator: Arc<BarAggregator>,
        clock: Arc<dyn Clock>,
        settings: BatcherSettings,
    ) -> Self {
        Self {
            registry,
            aggregator,
            clock,
            settings,
        }
    }

    /// Opens the bar of `key` for the period containing the current time.
    ///
    /// See [`Self::build_at`]. Must be called from within a tokio runtime.
    pub fn build(&self, key: BarKey) -> Option<BarInstance> {
        self.build_at(key, self.clock.now())
    }

    /// Opens the bar of `key` whose window starts at `period_start`.
    ///
    /// `period_start` is aligned down to a boundary of the key's period.
    /// The instance is registered with a fresh queue and a micro-batcher is
    /// started on that same queue, so quotes routed between the two steps
    /// are already waiting for it in arrival order. Returns `None` if the
    /// instance is already building.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build_at(&self, key: BarKey, period_start: DateTime<Utc>) -> Option<BarInstance> {
        let instance = key.instance_at(period_start);

        let Some(queue) = self.registry.activate(instance) else {
            tracing::warn!(bar = %instance, "bar already building, skipping");
            return None;
        };

        let sink: Arc<dyn BatchSink> = self.aggregator.clone();
        let batcher = MicroBatcher::new(
            instance,
            queue,
            self.settings,
            Arc::clone(&self.clock),
            sink,
        );
        if !self.registry.register_batcher(batcher.clone()) {
            tracing::warn!(bar = %instance, "stale micro-batcher registered, skipping");
            return None;
        }

        // the batcher owns the queue from here on, backlog included
        let backlog = batcher.queue().len();
        batcher.start();
        tracing::info!(bar = %instance, backlog, "bar opened");
        Some(instance)
    }
}
