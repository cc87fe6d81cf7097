//! OHLC accumulation and finalization.

use futures::future::join_all;
use std::sync::Arc;
use trendbar_store::BarStore;
use trendbar_types::{BarInstance, BarRecord, Quote};

use crate::{BarRegistry, BatchSink, FinalizeFailurePolicy, PipelineError, Result};

/// Folds batches into per-bar OHLC records and persists finished bars.
///
/// The record of a bar is opened by its first non-empty batch, widened by
/// every later batch and closed by the final one. Once a completed bar is
/// saved, its record, active-bar entry and batcher are released.
#[derive(Debug)]
pub struct BarAggregator {
    registry: Arc<BarRegistry>,
    store: Arc<dyn BarStore>,
    policy: FinalizeFailurePolicy,
}

impl BarAggregator {
    /// Creates an aggregator writing finished bars to `store`.
    #[must_use]
    pub fn new(
        registry: Arc<BarRegistry>,
        store: Arc<dyn BarStore>,
        policy: FinalizeFailurePolicy,
    ) -> Self {
        Self {
            registry,
            store,
            policy,
        }
    }

    /// Returns the shared registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<BarRegistry> {
        &self.registry
    }

    /// Returns the policy applied when a finished bar fails to save.
    #[must_use]
    pub const fn policy(&self) -> FinalizeFailurePolicy {
        self.policy
    }

    /// Shuts down every registered micro-batcher concurrently.
    ///
    /// Each batcher gets its own bounded grace period.
    pub async fn shutdown_all(&self) {
        let batchers = self.registry.batchers();
        if batchers.is_empty() {
            return;
        }
        tracing::info!(count = batchers.len(), "shutting down micro-batchers");
        join_all(batchers.iter().map(|batcher| batcher.shutdown())).await;
        for batcher in &batchers {
            self.registry.remove_batcher(&batcher.instance());
        }
    }

    fn persist(&self, record: BarRecord, instance: &BarInstance) -> Result<()> {
        match self.store.save(record) {
            Ok(saved) => {
                tracing::info!(
                    bar = %instance,
                    open = saved.open,
                    high = saved.high,
                    low = saved.low,
                    close = saved.close,
                    "bar completed"
                );
                self.registry.release(instance);
                Ok(())
            }
            Err(source) => {
                let retained = self.policy == FinalizeFailurePolicy::RetainOnFailure;
                if retained {
                    self.registry.put_record(record);
                } else {
                    self.registry.release(instance);
                }
                tracing::error!(bar = %instance, retained, error = %source, "failed to persist completed bar");
                Err(PipelineError::Persist {
                    instance: instance.to_string(),
                    retained,
                    source,
                })
            }
        }
    }
}

impl BatchSink for BarAggregator {
    fn process_batch(&self, batch: Vec<Quote>, instance: &BarInstance, is_final: bool) -> Result<()> {
        let (record, rest) = match self.registry.record(instance) {
            // finished but unsaved; only a final signal does anything
            Some(record) if record.is_completed() => {
                return if is_final {
                    self.persist(record, instance)
                } else {
                    Ok(())
                };
            }
            Some(record) => (record, &batch[..]),
            None => match BarRecord::open(instance, &batch) {
                Some(record) => (record, &batch[1..]),
                None => {
                    if is_final {
                        tracing::debug!(bar = %instance, "bar closed without quotes");
                        self.registry.release(instance);
                    }
                    return Ok(());
                }
            },
        };

        if is_final {
            self.persist(record.finalized(rest), instance)
        } else {
            self.registry.put_record(record.with_batch(rest));
            Ok(())
        }
    }

    fn release(&self, instance: &BarInstance) {
        tracing::warn!(bar = %instance, "abandoning bar after failed final batch");
        self.registry.release(instance);
    }
}
