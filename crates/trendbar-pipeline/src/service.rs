//! Composition root for the pipeline.

use std::sync::Arc;
use trendbar_store::BarStore;

use crate::{
    BarAggregator, BarBuilder, BarRegistry, Clock, ConfigError, PeriodScheduler, PipelineConfig,
    QuoteFeed, QuoteRouter,
};

/// Owns every pipeline component and runs them as one service.
///
/// Components are built leaves first: registry, aggregator, builder,
/// scheduler, router. Shutdown runs in the opposite direction of the data
/// it would lose: scheduling stops first, then the micro-batchers are
/// drained, and the router goes last.
#[derive(Debug)]
pub struct TrendBarService {
    config: PipelineConfig,
    registry: Arc<BarRegistry>,
    aggregator: Arc<BarAggregator>,
    scheduler: PeriodScheduler,
    router: QuoteRouter,
}

impl TrendBarService {
    /// Validates `config` and wires the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn BarStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(BarRegistry::new());
        let aggregator = Arc::new(BarAggregator::new(
            Arc::clone(&registry),
            store,
            config.failure_policy,
        ));
        let builder = Arc::new(BarBuilder::new(
            Arc::clone(&registry),
            Arc::clone(&aggregator),
            Arc::clone(&clock),
            config.batcher_settings(),
        ));
        let scheduler = PeriodScheduler::new(
            Arc::clone(&registry),
            builder,
            Arc::clone(&aggregator),
            clock,
            config.tracked_keys.clone(),
            config.shutdown_grace(),
        );
        let router = QuoteRouter::new(Arc::clone(&registry), config.shutdown_grace());

        Ok(Self {
            config,
            registry,
            aggregator,
            scheduler,
            router,
        })
    }

    /// Starts the router and arms every scheduled key.
    ///
    /// Returns the handle for feeding quotes. Must be called from within a
    /// tokio runtime.
    pub fn start(&self) -> QuoteFeed {
        self.router.start();
        let armed = self.scheduler.start_all();
        tracing::info!(keys = armed, "trend bar service started");
        self.router.feed()
    }

    /// Returns a handle for feeding quotes.
    #[must_use]
    pub fn feed(&self) -> QuoteFeed {
        self.router.feed()
    }

    /// Returns the configuration in use.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the shared registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<BarRegistry> {
        &self.registry
    }

    /// Returns the aggregator.
    #[must_use]
    pub const fn aggregator(&self) -> &Arc<BarAggregator> {
        &self.aggregator
    }

    /// Returns the router.
    #[must_use]
    pub const fn router(&self) -> &QuoteRouter {
        &self.router
    }

    /// Returns the scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &PeriodScheduler {
        &self.scheduler
    }

    /// Stops the service: scheduler (and with it every micro-batcher)
    /// first, router last. Safe to call more than once.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down trend bar service");
        self.scheduler.shutdown().await;
        self.router.shutdown().await;
        tracing::info!(
            routed = self.router.stats().routed(),
            rejected = self.router.stats().rejected(),
            "trend bar service stopped"
        );
    }
}
