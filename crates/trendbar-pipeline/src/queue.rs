//! Per-bar quote queue.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use trendbar_types::Quote;

/// FIFO of quotes waiting for one bar's micro-batcher.
///
/// Any number of producers may push; a single consumer pops. The lock is
/// only held for the queue operation itself, never across an await.
#[derive(Debug, Default)]
pub struct QuoteQueue {
    quotes: Mutex<VecDeque<Quote>>,
    notify: Notify,
}

impl QuoteQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a quote at the back.
    pub fn push(&self, quote: Quote) {
        self.quotes.lock().push_back(quote);
        self.notify.notify_one();
    }

    /// Pops the oldest quote without waiting.
    #[must_use]
    pub fn try_pop(&self) -> Option<Quote> {
        self.quotes.lock().pop_front()
    }

    /// Pops the oldest quote, waiting up to `timeout` for one to arrive.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<Quote> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(quote) = self.try_pop() {
                return Some(quote);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_pop();
            }
        }
    }

    /// Removes and returns everything queued, oldest first.
    #[must_use]
    pub fn take_backlog(&self) -> Vec<Quote> {
        self.quotes.lock().drain(..).collect()
    }

    /// Returns the number of queued quotes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quotes.lock().len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotes.lock().is_empty()
    }
}
