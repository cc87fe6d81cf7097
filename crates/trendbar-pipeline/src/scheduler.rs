//! Period-aligned bar scheduling.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trendbar_types::BarKey;

use crate::{BarAggregator, BarBuilder, BarRegistry, Clock};

/// Arms one periodic timer per tracked key.
///
/// Each timer sleeps until the next period boundary of the injected clock
/// and builds the bar starting at that boundary. The delay is re-measured
/// from the clock before every tick. A tick that wakes early still opens
/// the bar it was aimed at; boundaries missed while the process stalled
/// are skipped rather than built in a burst.
#[derive(Debug)]
pub struct PeriodScheduler {
    registry: Arc<BarRegistry>,
    builder: Arc<BarBuilder>,
    aggregator: Arc<BarAggregator>,
    clock: Arc<dyn Clock>,
    keys: Vec<BarKey>,
    cancel: CancellationToken,
    shutdown_grace: Duration,
}

impl PeriodScheduler {
    /// Creates a scheduler for `keys`.
    #[must_use]
    pub fn new(
        registry: Arc<BarRegistry>,
        builder: Arc<BarBuilder>,
        aggregator: Arc<BarAggregator>,
        clock: Arc<dyn Clock>,
        keys: Vec<BarKey>,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            registry,
            builder,
            aggregator,
            clock,
            keys,
            cancel: CancellationToken::new(),
            shutdown_grace,
        }
    }

    /// Tracks every configured key and arms its timer.
    ///
    /// Returns the number of timers armed. Must be called from within a
    /// tokio runtime.
    pub fn start_all(&self) -> usize {
        for key in &self.keys {
            self.registry.track(*key);
        }
        self.keys.iter().filter(|key| self.schedule(**key)).count()
    }

    /// Arms the timer of `key` unless one is already armed.
    ///
    /// Returns whether a timer was armed.
    pub fn schedule(&self, key: BarKey) -> bool {
        let armed = self
            .registry
            .arm_if_unscheduled(key, || self.spawn_timer(key));
        if armed {
            tracing::info!(key = %key, "scheduled bar key");
        } else {
            tracing::warn!(key = %key, "bar key already scheduled, skipping");
        }
        armed
    }

    fn spawn_timer(&self, key: BarKey) -> JoinHandle<()> {
        let builder = Arc::clone(&self.builder);
        let clock = Arc::clone(&self.clock);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let mut last_built: Option<DateTime<Utc>> = None;
            loop {
                let now = clock.now();
                let next = key.period.next_start(now);
                let boundary = match last_built {
                    Some(last) => next.max(last + key.period.delta()),
                    None => next,
                };
                let delay = (boundary - now).to_std().unwrap_or(Duration::ZERO);

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {
                        builder.build_at(key, boundary);
                        last_built = Some(boundary);
                    }
                }
            }
        })
    }

    /// Stops every timer, then shuts down all outstanding micro-batchers.
    ///
    /// Timers that do not stop within the grace period are aborted.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let grace = self.shutdown_grace;

        join_all(
            self.registry
                .take_schedules()
                .into_iter()
                .map(|(key, mut handle)| async move {
                    if tokio::time::timeout(grace, &mut handle).await.is_err() {
                        tracing::error!(key = %key, "timer did not stop in time, aborting");
                        handle.abort();
                    }
                }),
        )
        .await;

        self.aggregator.shutdown_all().await;
    }
}
