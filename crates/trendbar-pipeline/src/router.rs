//! Routing inbound quotes to the bars they belong to.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trendbar_types::RawQuote;

use crate::{BarRegistry, PipelineError, Result};

/// Sending half of the raw quote feed.
///
/// Cheap to clone; every clone feeds the same router.
#[derive(Debug, Clone)]
pub struct QuoteFeed {
    tx: mpsc::UnboundedSender<RawQuote>,
}

impl QuoteFeed {
    /// Pushes a raw quote into the feed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FeedClosed`] once the router has stopped.
    pub fn send(&self, quote: RawQuote) -> Result<()> {
        self.tx.send(quote).map_err(|_| PipelineError::FeedClosed)
    }

    /// Returns true once the router has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Running totals of the router's decisions.
#[derive(Debug, Default)]
pub struct RouterStats {
    routed: AtomicU64,
    rejected: AtomicU64,
    unmatched: AtomicU64,
}

impl RouterStats {
    /// Quotes placed on at least one bar queue.
    #[must_use]
    pub fn routed(&self) -> u64 {
        self.routed.load(Ordering::Relaxed)
    }

    /// Quotes dropped for failing validation.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Valid quotes that matched no active bar.
    #[must_use]
    pub fn unmatched(&self) -> u64 {
        self.unmatched.load(Ordering::Relaxed)
    }
}

/// Drains the quote feed and fans each quote into the queues of the
/// active bars whose window contains it.
#[derive(Debug)]
pub struct QuoteRouter {
    registry: Arc<BarRegistry>,
    stats: Arc<RouterStats>,
    feed: QuoteFeed,
    rx: Mutex<Option<mpsc::UnboundedReceiver<RawQuote>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown_grace: Duration,
}

impl QuoteRouter {
    /// Creates a stopped router over `registry`.
    #[must_use]
    pub fn new(registry: Arc<BarRegistry>, shutdown_grace: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            registry,
            stats: Arc::new(RouterStats::default()),
            feed: QuoteFeed { tx },
            rx: Mutex::new(Some(rx)),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
            shutdown_grace,
        }
    }

    /// Returns a handle for pushing quotes into the router.
    #[must_use]
    pub fn feed(&self) -> QuoteFeed {
        self.feed.clone()
    }

    /// Returns the routing totals.
    #[must_use]
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Spawns the worker that drains the feed.
    ///
    /// Returns false if the router was already started. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) -> bool {
        let Some(mut rx) = self.rx.lock().take() else {
            return false;
        };
        let registry = Arc::clone(&self.registry);
        let stats = Arc::clone(&self.stats);
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            tracing::info!("quote router started");
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Some(quote) => {
                            route_quote(&registry, &stats, quote);
                        }
                        None => break,
                    },
                }
            }
            rx.close();
            tracing::info!(
                routed = stats.routed(),
                rejected = stats.rejected(),
                unmatched = stats.unmatched(),
                "quote router stopped"
            );
        });
        *self.task.lock() = Some(handle);
        true
    }

    /// Routes one quote synchronously and returns how many bar queues it
    /// was placed on.
    ///
    /// Invalid quotes are logged and dropped.
    pub fn route(&self, quote: RawQuote) -> usize {
        route_quote(&self.registry, &self.stats, quote)
    }

    /// Stops the worker, waiting up to the grace period before aborting it.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(self.shutdown_grace, &mut handle)
                .await
                .is_err()
            {
                tracing::error!("quote router did not stop in time, aborting");
                handle.abort();
            }
        }
    }
}

fn route_quote(registry: &BarRegistry, stats: &RouterStats, raw: RawQuote) -> usize {
    let quote = match raw.validate() {
        Ok(quote) => quote,
        Err(e) => {
            stats.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, ?raw, "dropping invalid quote");
            return 0;
        }
    };

    let mut placed = 0;
    for (instance, queue) in registry.active_bars() {
        if instance.accepts(&quote) {
            queue.push(quote);
            placed += 1;
        }
    }

    if placed == 0 {
        stats.unmatched.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(instrument = %quote.instrument, timestamp = %quote.timestamp, "no active bar for quote");
    } else {
        stats.routed.fetch_add(1, Ordering::Relaxed);
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use trendbar_types::{BarInstance, BarKey, Currency, Instrument, Period};

    const EURUSD: Instrument = Instrument::new(Currency::EUR, Currency::USD);
    const EURJPY: Instrument = Instrument::new(Currency::EUR, Currency::JPY);

    fn period_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn millis(offset: TimeDelta) -> i64 {
        (period_start() + offset).timestamp_millis()
    }

    fn router() -> QuoteRouter {
        QuoteRouter::new(Arc::new(BarRegistry::new()), Duration::from_secs(1))
    }

    #[test]
    fn test_route_strict_window() {
        let router = router();
        let instance = BarInstance::new(BarKey::new(EURUSD, Period::Minute1), period_start());
        let queue = router.registry.activate(instance).unwrap();

        assert_eq!(router.route(RawQuote::new(EURUSD, 1.1, millis(TimeDelta::zero()))), 0);
        assert_eq!(router.route(RawQuote::new(EURUSD, 1.1, millis(TimeDelta::seconds(1)))), 1);
        assert_eq!(router.route(RawQuote::new(EURUSD, 1.1, millis(TimeDelta::minutes(1)))), 0);
        assert_eq!(router.route(RawQuote::new(EURJPY, 160.0, millis(TimeDelta::seconds(1)))), 0);

        assert_eq!(queue.len(), 1);
        assert_eq!(router.stats().routed(), 1);
        assert_eq!(router.stats().unmatched(), 3);
    }

    #[test]
    fn test_route_fans_out_across_periods() {
        let router = router();
        let minute = BarInstance::new(BarKey::new(EURUSD, Period::Minute1), period_start());
        let hour = BarInstance::new(BarKey::new(EURUSD, Period::Hour1), period_start());
        let minute_queue = router.registry.activate(minute).unwrap();
        let hour_queue = router.registry.activate(hour).unwrap();

        assert_eq!(router.route(RawQuote::new(EURUSD, 1.1, millis(TimeDelta::seconds(30)))), 2);
        assert_eq!(router.route(RawQuote::new(EURUSD, 1.1, millis(TimeDelta::minutes(5)))), 1);

        assert_eq!(minute_queue.len(), 1);
        assert_eq!(hour_queue.len(), 2);
    }

    #[test]
    fn test_route_rejects_invalid() {
        let router = router();
        let instance = BarInstance::new(BarKey::new(EURUSD, Period::Minute1), period_start());
        let queue = router.registry.activate(instance).unwrap();

        let mut no_price = RawQuote::new(EURUSD, 1.1, millis(TimeDelta::seconds(1)));
        no_price.price = None;
        let mut no_instrument = no_price;
        no_instrument.price = Some(1.1);
        no_instrument.instrument = None;

        assert_eq!(router.route(no_price), 0);
        assert_eq!(router.route(no_instrument), 0);
        assert_eq!(router.route(RawQuote::new(EURUSD, 1.1, 0)), 0);

        assert!(queue.is_empty());
        assert_eq!(router.stats().rejected(), 3);
    }

    #[tokio::test]
    async fn test_worker_drains_feed() {
        let router = router();
        let instance = BarInstance::new(BarKey::new(EURUSD, Period::Minute1), period_start());
        let queue = router.registry.activate(instance).unwrap();

        assert!(router.start());
        assert!(!router.start());

        let feed = router.feed();
        for i in 1..=3 {
            feed.send(RawQuote::new(EURUSD, 1.1, millis(TimeDelta::seconds(i))))
                .unwrap();
        }

        while router.stats().routed() < 3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(queue.len(), 3);

        router.shutdown().await;
        assert!(feed.is_closed());
        assert!(matches!(
            feed.send(RawQuote::new(EURUSD, 1.1, 1)),
            Err(PipelineError::FeedClosed)
        ));
    }
}
