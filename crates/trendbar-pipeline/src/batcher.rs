//! Per-bar micro-batching.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use trendbar_types::{BarInstance, Quote};

use crate::{Clock, PipelineConfig, PipelineError, QuoteQueue};

/// Receiver of the batches a [`MicroBatcher`] emits.
///
/// Called on a blocking worker thread, one batch at a time per bar.
pub trait BatchSink: std::fmt::Debug + Send + Sync {
    /// Folds `batch` into the bar of `instance`.
    ///
    /// `is_final` marks the last batch of the bar, which may be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be applied or the finished
    /// bar could not be persisted.
    fn process_batch(
        &self,
        batch: Vec<Quote>,
        instance: &BarInstance,
        is_final: bool,
    ) -> Result<(), PipelineError>;

    /// Drops whatever is held for `instance` after its final batch failed
    /// and the batcher gave up on it.
    fn release(&self, instance: &BarInstance);
}

/// Timing and sizing of a micro-batcher's cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatcherSettings {
    /// Pending quote count that ends a cycle early.
    pub execution_threshold: usize,
    /// Length of one collect/dispatch cycle.
    pub cycle_budget: Duration,
    /// Queue poll timeout within a cycle.
    pub poll_timeout: Duration,
    /// Bounded wait in [`MicroBatcher::shutdown`].
    pub shutdown_grace: Duration,
}

impl Default for BatcherSettings {
    fn default() -> Self {
        PipelineConfig::default().batcher_settings()
    }
}

/// Lifecycle of a micro-batcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatcherState {
    /// Created but not started.
    Idle,
    /// Cycling.
    Running,
    /// Stopped for good.
    Terminated,
}

enum CycleOutcome {
    Continue,
    Done,
}

/// Collects the quotes of one bar and hands them to a [`BatchSink`].
///
/// Every cycle polls the bar's queue until the cycle budget runs out, the
/// execution threshold is reached, or the queue is found empty after the
/// bar's window has closed. Gathered quotes are dispatched and the cycle
/// waits for the sink to finish before the next one starts. The cycle that
/// detects the end of the window dispatches with the final flag set, after
/// which the batcher terminates.
///
/// Cheap to clone; clones share the same running batcher.
#[derive(Debug, Clone)]
pub struct MicroBatcher {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    instance: BarInstance,
    queue: Arc<QuoteQueue>,
    settings: BatcherSettings,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn BatchSink>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    state: Mutex<BatcherState>,
}

impl MicroBatcher {
    /// Creates an idle batcher bound to `queue`.
    #[must_use]
    pub fn new(
        instance: BarInstance,
        queue: Arc<QuoteQueue>,
        settings: BatcherSettings,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn BatchSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                instance,
                queue,
                settings,
                clock,
                sink,
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
                state: Mutex::new(BatcherState::Idle),
            }),
        }
    }

    /// Spawns the cycle task. Does nothing if already started or cancelled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.inner.task.lock();
        if task.is_some() || self.inner.cancel.is_cancelled() {
            return;
        }
        *self.inner.state.lock() = BatcherState::Running;
        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(inner.run()));
    }

    /// Returns the bar this batcher collects for.
    #[must_use]
    pub fn instance(&self) -> BarInstance {
        self.inner.instance
    }

    /// Returns the queue this batcher drains.
    #[must_use]
    pub fn queue(&self) -> &Arc<QuoteQueue> {
        &self.inner.queue
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BatcherState {
        *self.inner.state.lock()
    }

    /// Returns true once the batcher has stopped for good.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state() == BatcherState::Terminated
    }

    /// Enqueues a quote for this bar.
    pub fn submit(&self, quote: Quote) {
        self.inner.queue.push(quote);
    }

    /// Signals the batcher to stop without waiting for it.
    ///
    /// Quotes gathered by an in-progress cycle are still dispatched.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Stops the batcher and waits for its cycle task, up to the grace
    /// period. A task that overruns is aborted.
    pub async fn shutdown(&self) {
        self.cancel();
        let handle = self.inner.task.lock().take();
        if let Some(mut handle) = handle {
            match tokio::time::timeout(self.inner.settings.shutdown_grace, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(bar = %self.inner.instance, error = %e, "micro-batcher task failed");
                }
                Err(_) => {
                    tracing::error!(
                        bar = %self.inner.instance,
                        grace_ms = self.inner.settings.shutdown_grace.as_millis() as u64,
                        "micro-batcher did not stop in time, aborting"
                    );
                    handle.abort();
                }
            }
        }
        *self.inner.state.lock() = BatcherState::Terminated;
    }
}

impl Inner {
    async fn run(self: Arc<Self>) {
        tracing::debug!(bar = %self.instance, "micro-batcher started");

        let mut ticker = tokio::time::interval(self.settings.cycle_budget);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if matches!(self.cycle().await, CycleOutcome::Done) {
                break;
            }
        }

        self.cancel.cancel();
        *self.state.lock() = BatcherState::Terminated;
        tracing::debug!(bar = %self.instance, "micro-batcher stopped");
    }

    async fn cycle(&self) -> CycleOutcome {
        let deadline = Instant::now() + self.settings.cycle_budget;
        let mut pending = Vec::new();
        let mut is_final = false;

        while !self.cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = self.settings.poll_timeout.min(deadline - now);

            let polled = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                quote = self.queue.pop_timeout(wait) => quote,
            };

            match polled {
                Some(quote) => {
                    pending.push(quote);
                    if pending.len() >= self.settings.execution_threshold {
                        break;
                    }
                }
                None if self.instance.has_elapsed(self.clock.now()) => {
                    is_final = true;
                    break;
                }
                None => {}
            }
        }

        if pending.is_empty() && !is_final {
            return if self.cancel.is_cancelled() {
                CycleOutcome::Done
            } else {
                CycleOutcome::Continue
            };
        }

        match self.dispatch(pending, is_final).await {
            Ok(()) if is_final => CycleOutcome::Done,
            Ok(()) => CycleOutcome::Continue,
            Err(e) if e.is_retained() => {
                tracing::warn!(bar = %self.instance, error = %e, "final batch failed, retrying next cycle");
                CycleOutcome::Continue
            }
            Err(e) => {
                tracing::error!(bar = %self.instance, is_final, error = %e, "batch processing failed");
                if is_final {
                    self.sink.release(&self.instance);
                    CycleOutcome::Done
                } else {
                    CycleOutcome::Continue
                }
            }
        }
    }

    async fn dispatch(&self, batch: Vec<Quote>, is_final: bool) -> Result<(), PipelineError> {
        tracing::debug!(bar = %self.instance, size = batch.len(), is_final, "dispatching batch");

        let sink = Arc::clone(&self.sink);
        let instance = self.instance;
        tokio::task::spawn_blocking(move || sink.process_batch(batch, &instance, is_final))
            .await
            .map_err(|e| PipelineError::Dispatch(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use trendbar_store::StoreError;
    use trendbar_types::{BarKey, Currency, Instrument, Period};

    const EURUSD: Instrument = Instrument::new(Currency::EUR, Currency::USD);

    #[derive(Debug, Default)]
    struct RecordingSink {
        batches: Mutex<Vec<(Vec<f64>, bool)>>,
        retain_failures: Mutex<usize>,
    }

    impl RecordingSink {
        fn batches(&self) -> Vec<(Vec<f64>, bool)> {
            self.batches.lock().clone()
        }
    }

    impl BatchSink for RecordingSink {
        fn process_batch(
            &self,
            batch: Vec<Quote>,
            instance: &BarInstance,
            is_final: bool,
        ) -> Result<(), PipelineError> {
            self.batches
                .lock()
                .push((batch.iter().map(|q| q.price).collect(), is_final));

            let mut failures = self.retain_failures.lock();
            if is_final && *failures > 0 {
                *failures -= 1;
                return Err(PipelineError::Persist {
                    instance: instance.to_string(),
                    retained: true,
                    source: StoreError::Unavailable("test".to_string()),
                });
            }
            Ok(())
        }

        fn release(&self, _instance: &BarInstance) {}
    }

    /// Fails every final batch the way a crashing store would.
    #[derive(Debug, Default)]
    struct CrashingSink {
        released: Mutex<Vec<BarInstance>>,
    }

    impl BatchSink for CrashingSink {
        fn process_batch(
            &self,
            _batch: Vec<Quote>,
            _instance: &BarInstance,
            is_final: bool,
        ) -> Result<(), PipelineError> {
            if is_final {
                panic!("store connection lost");
            }
            Ok(())
        }

        fn release(&self, instance: &BarInstance) {
            self.released.lock().push(*instance);
        }
    }

    /// Holds the blocking worker well past any shutdown grace period.
    #[derive(Debug, Default)]
    struct StallingSink {
        entered: AtomicBool,
    }

    impl BatchSink for StallingSink {
        fn process_batch(
            &self,
            _batch: Vec<Quote>,
            _instance: &BarInstance,
            _is_final: bool,
        ) -> Result<(), PipelineError> {
            self.entered.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(800));
            Ok(())
        }

        fn release(&self, _instance: &BarInstance) {}
    }

    fn period_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn instance() -> BarInstance {
        BarInstance::new(BarKey::new(EURUSD, Period::Minute1), period_start())
    }

    fn quote(price: f64) -> Quote {
        Quote::new(EURUSD, price, period_start() + TimeDelta::seconds(10))
    }

    fn settings(threshold: usize) -> BatcherSettings {
        BatcherSettings {
            execution_threshold: threshold,
            cycle_budget: Duration::from_millis(1000),
            poll_timeout: Duration::from_millis(10),
            shutdown_grace: Duration::from_millis(500),
        }
    }

    fn batcher(
        threshold: usize,
        clock: &Arc<ManualClock>,
        sink: &Arc<RecordingSink>,
    ) -> MicroBatcher {
        let clock: Arc<dyn Clock> = clock.clone();
        let sink: Arc<dyn BatchSink> = sink.clone();
        MicroBatcher::new(
            instance(),
            Arc::new(QuoteQueue::new()),
            settings(threshold),
            clock,
            sink,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_emits_exact_batch() {
        let clock = Arc::new(ManualClock::new(period_start() + TimeDelta::seconds(30)));
        let sink = Arc::new(RecordingSink::default());
        let batcher = batcher(5, &clock, &sink);

        for i in 0..7 {
            batcher.submit(quote(1.0 + f64::from(i) / 10.0));
        }
        batcher.start();
        assert_eq!(batcher.state(), BatcherState::Running);

        // the first cycle stops at the threshold, the second runs out its budget
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let batches = sink.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0.len(), 5);
        assert!(!batches[0].1);
        assert_eq!(batches[1].0.len(), 2);
        assert!(!batches[1].1);

        batcher.shutdown().await;
        assert!(batcher.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_batch_before_period_end() {
        let clock = Arc::new(ManualClock::new(period_start() + TimeDelta::seconds(30)));
        let sink = Arc::new(RecordingSink::default());
        let batcher = batcher(5, &clock, &sink);

        batcher.submit(quote(1.2222));
        batcher.submit(quote(1.1111));
        batcher.submit(quote(1.3333));
        batcher.start();

        tokio::time::sleep(Duration::from_millis(2500)).await;

        // a single non-final batch, and no empty dispatches while open
        assert_eq!(sink.batches(), vec![(vec![1.2222, 1.1111, 1.3333], false)]);
        assert_eq!(batcher.state(), BatcherState::Running);

        batcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_dispatch_after_period_end() {
        let clock = Arc::new(ManualClock::new(period_start() + TimeDelta::seconds(30)));
        let sink = Arc::new(RecordingSink::default());
        let batcher = batcher(5, &clock, &sink);

        batcher.submit(quote(1.1));
        batcher.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        batcher.submit(quote(1.0));
        batcher.submit(quote(1.4));
        clock.set(period_start() + TimeDelta::seconds(61));
        tokio::time::sleep(Duration::from_millis(3000)).await;

        assert_eq!(
            sink.batches(),
            vec![(vec![1.1], false), (vec![1.0, 1.4], true)]
        );
        assert!(batcher.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_final_dispatch_once() {
        let clock = Arc::new(ManualClock::new(period_start() + TimeDelta::seconds(90)));
        let sink = Arc::new(RecordingSink::default());
        let batcher = batcher(5, &clock, &sink);

        batcher.start();
        tokio::time::sleep(Duration::from_millis(5000)).await;

        assert_eq!(sink.batches(), vec![(vec![], true)]);
        assert!(batcher.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retained_final_is_retried() {
        let clock = Arc::new(ManualClock::new(period_start() + TimeDelta::seconds(90)));
        let sink = Arc::new(RecordingSink::default());
        *sink.retain_failures.lock() = 1;
        let batcher = batcher(5, &clock, &sink);

        batcher.start();
        tokio::time::sleep(Duration::from_millis(5000)).await;

        assert_eq!(sink.batches(), vec![(vec![], true), (vec![], true)]);
        assert!(batcher.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_delivers_gathered_quotes() {
        let clock = Arc::new(ManualClock::new(period_start() + TimeDelta::seconds(30)));
        let sink = Arc::new(RecordingSink::default());
        let batcher = batcher(100, &clock, &sink);
        batcher.start();

        // let the first cycle begin polling, then feed it mid-cycle
        tokio::time::sleep(Duration::from_millis(100)).await;
        batcher.submit(quote(1.3));
        batcher.submit(quote(1.2));
        tokio::time::sleep(Duration::from_millis(100)).await;

        batcher.shutdown().await;

        assert_eq!(sink.batches(), vec![(vec![1.3, 1.2], false)]);
        assert!(batcher.is_terminated());

        // idempotent
        batcher.shutdown().await;
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_final_dispatch_releases_bar() {
        let clock: Arc<dyn Clock> =
            Arc::new(ManualClock::new(period_start() + TimeDelta::seconds(90)));
        let sink = Arc::new(CrashingSink::default());
        let batcher = MicroBatcher::new(
            instance(),
            Arc::new(QuoteQueue::new()),
            settings(5),
            clock,
            sink.clone(),
        );

        batcher.submit(quote(1.1));
        batcher.start();
        tokio::time::sleep(Duration::from_millis(5000)).await;

        assert!(batcher.is_terminated());
        assert_eq!(*sink.released.lock(), vec![instance()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_aborts_stuck_dispatch() {
        let clock: Arc<dyn Clock> =
            Arc::new(ManualClock::new(period_start() + TimeDelta::seconds(30)));
        let sink = Arc::new(StallingSink::default());
        let stuck = MicroBatcher::new(
            instance(),
            Arc::new(QuoteQueue::new()),
            BatcherSettings {
                execution_threshold: 1,
                cycle_budget: Duration::from_millis(50),
                poll_timeout: Duration::from_millis(5),
                shutdown_grace: Duration::from_millis(100),
            },
            Arc::clone(&clock),
            sink.clone(),
        );
        stuck.submit(quote(1.1));
        stuck.start();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !sink.entered.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let started = Instant::now();
        stuck.shutdown().await;
        let waited = started.elapsed();

        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_millis(600));
        assert!(stuck.is_terminated());

        // teardown of other bars carries on normally
        let recording = Arc::new(RecordingSink::default());
        let healthy = MicroBatcher::new(
            instance(),
            Arc::new(QuoteQueue::new()),
            BatcherSettings {
                execution_threshold: 10,
                cycle_budget: Duration::from_millis(50),
                poll_timeout: Duration::from_millis(5),
                shutdown_grace: Duration::from_millis(500),
            },
            clock,
            recording.clone(),
        );
        healthy.start();
        healthy.submit(quote(1.2));
        tokio::time::sleep(Duration::from_millis(150)).await;
        healthy.shutdown().await;

        assert!(healthy.is_terminated());
        assert_eq!(recording.batches(), vec![(vec![1.2], false)]);
    }
}
