//! Shared per-bar state.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::task::JoinHandle;
use trendbar_types::{BarInstance, BarKey, BarRecord, Quote};

use crate::{MicroBatcher, QuoteQueue};

/// Scheduling state of a tracked bar key.
#[derive(Debug)]
pub enum ScheduleState {
    /// Tracked, but no timer is armed.
    Unscheduled,
    /// A periodic timer is armed.
    Scheduled(JoinHandle<()>),
}

impl ScheduleState {
    /// Returns true if a timer is armed.
    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled(_))
    }
}

/// The registries shared by the pipeline components.
///
/// Each map has its own lock and is only touched through single-step
/// operations (insert-if-absent, update-if-present, remove, snapshot), so
/// no lock is ever held across an await or while calling into another
/// component.
#[derive(Debug, Default)]
pub struct BarRegistry {
    schedules: Mutex<HashMap<BarKey, ScheduleState>>,
    active_bars: Mutex<HashMap<BarInstance, Arc<QuoteQueue>>>,
    batchers: Mutex<HashMap<BarInstance, MicroBatcher>>,
    records: Mutex<HashMap<BarInstance, BarRecord>>,
}

impl BarRegistry {
    /// Creates empty registries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- schedules ---

    /// Starts tracking `key` as unscheduled. Returns false if already tracked.
    pub fn track(&self, key: BarKey) -> bool {
        match self.schedules.lock().entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(ScheduleState::Unscheduled);
                true
            }
        }
    }

    /// Arms a timer for `key` unless one is already armed.
    ///
    /// `arm` runs only when the key is not scheduled, and its handle is
    /// stored in the same step. Returns whether a timer was armed.
    pub fn arm_if_unscheduled(&self, key: BarKey, arm: impl FnOnce() -> JoinHandle<()>) -> bool {
        let mut schedules = self.schedules.lock();
        let state = schedules.entry(key).or_insert(ScheduleState::Unscheduled);
        if state.is_scheduled() {
            return false;
        }
        *state = ScheduleState::Scheduled(arm());
        true
    }

    /// Returns true if a timer is armed for `key`.
    #[must_use]
    pub fn is_scheduled(&self, key: &BarKey) -> bool {
        self.schedules
            .lock()
            .get(key)
            .is_some_and(ScheduleState::is_scheduled)
    }

    /// Returns every tracked key.
    #[must_use]
    pub fn tracked_keys(&self) -> Vec<BarKey> {
        self.schedules.lock().keys().copied().collect()
    }

    /// Takes every armed timer handle, leaving the keys unscheduled.
    pub fn take_schedules(&self) -> Vec<(BarKey, JoinHandle<()>)> {
        let mut schedules = self.schedules.lock();
        let mut handles = Vec::new();
        for (key, state) in schedules.iter_mut() {
            if let ScheduleState::Scheduled(handle) =
                std::mem::replace(state, ScheduleState::Unscheduled)
            {
                handles.push((*key, handle));
            }
        }
        handles
    }

    // --- active bars ---

    /// Registers `instance` as building and returns its new queue.
    ///
    /// Returns `None` if the instance is already active.
    pub fn activate(&self, instance: BarInstance) -> Option<Arc<QuoteQueue>> {
        match self.active_bars.lock().entry(instance) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => Some(Arc::clone(entry.insert(Arc::new(QuoteQueue::new())))),
        }
    }

    /// Returns true if `instance` is building.
    #[must_use]
    pub fn is_active(&self, instance: &BarInstance) -> bool {
        self.active_bars.lock().contains_key(instance)
    }

    /// Returns the queue of an active instance.
    #[must_use]
    pub fn queue(&self, instance: &BarInstance) -> Option<Arc<QuoteQueue>> {
        self.active_bars.lock().get(instance).cloned()
    }

    /// Returns a snapshot of the active instances and their queues.
    #[must_use]
    pub fn active_bars(&self) -> Vec<(BarInstance, Arc<QuoteQueue>)> {
        self.active_bars
            .lock()
            .iter()
            .map(|(instance, queue)| (*instance, Arc::clone(queue)))
            .collect()
    }

    /// Appends `quote` to the queue of `instance` if it is active.
    pub fn enqueue(&self, instance: &BarInstance, quote: Quote) -> bool {
        match self.queue(instance) {
            Some(queue) => {
                queue.push(quote);
                true
            }
            None => false,
        }
    }

    /// Returns the number of active instances.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_bars.lock().len()
    }

    // --- batchers ---

    /// Registers a batcher for its instance. Returns false if one exists.
    pub fn register_batcher(&self, batcher: MicroBatcher) -> bool {
        match self.batchers.lock().entry(batcher.instance()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(batcher);
                true
            }
        }
    }

    /// Returns the batcher of `instance`.
    #[must_use]
    pub fn batcher(&self, instance: &BarInstance) -> Option<MicroBatcher> {
        self.batchers.lock().get(instance).cloned()
    }

    /// Removes and returns the batcher of `instance`.
    pub fn remove_batcher(&self, instance: &BarInstance) -> Option<MicroBatcher> {
        self.batchers.lock().remove(instance)
    }

    /// Returns a snapshot of the registered batchers.
    #[must_use]
    pub fn batchers(&self) -> Vec<MicroBatcher> {
        self.batchers.lock().values().cloned().collect()
    }

    /// Returns the number of registered batchers.
    #[must_use]
    pub fn batcher_count(&self) -> usize {
        self.batchers.lock().len()
    }

    // --- records ---

    /// Returns the record of `instance`.
    #[must_use]
    pub fn record(&self, instance: &BarInstance) -> Option<BarRecord> {
        self.records.lock().get(instance).copied()
    }

    /// Stores the record of its instance, replacing any previous one.
    pub fn put_record(&self, record: BarRecord) {
        self.records.lock().insert(record.instance(), record);
    }

    /// Returns the number of records in progress.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    /// Forgets everything about `instance` and stops its batcher.
    ///
    /// Only signals the batcher; it does not wait for it to finish.
    pub fn release(&self, instance: &BarInstance) {
        self.active_bars.lock().remove(instance);
        self.records.lock().remove(instance);
        if let Some(batcher) = self.remove_batcher(instance) {
            batcher.cancel();
        }
    }
}
