//! Process-local bar storage.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use trendbar_types::{BarInstance, BarRecord, Instrument, Period};
use uuid::Uuid;

use crate::{BarStore, Result, StoreError};

/// A bar store backed by an in-memory ordered map.
///
/// Also counts save attempts and can be told to refuse saves, which makes
/// it the store of choice for exercising the pipeline's failure handling.
#[derive(Debug, Default)]
pub struct InMemoryBarStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    bars: BTreeMap<BarInstance, BarRecord>,
    saves: usize,
    failures_left: usize,
}

impl InMemoryBarStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` saves fail with [`StoreError::Unavailable`].
    pub fn fail_next_saves(&self, count: usize) {
        self.state.lock().failures_left = count;
    }

    /// Returns the number of save attempts, failed ones included.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.state.lock().saves
    }

    /// Returns the number of stored bars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().bars.len()
    }

    /// Returns true if no bar is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().bars.is_empty()
    }

    /// Returns every stored bar, ordered by instrument, period and start.
    #[must_use]
    pub fn records(&self) -> Vec<BarRecord> {
        self.state.lock().bars.values().copied().collect()
    }
}

impl BarStore for InMemoryBarStore {
    fn save(&self, record: BarRecord) -> Result<BarRecord> {
        let mut state = self.state.lock();
        state.saves += 1;
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(StoreError::Unavailable(format!(
                "save of {} refused",
                record.instance()
            )));
        }

        let record = match record.id {
            Some(_) => record,
            None => record.with_id(Uuid::new_v4()),
        };
        state.bars.insert(record.instance(), record);
        Ok(record)
    }

    fn find_range(
        &self,
        instrument: Instrument,
        period: Period,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BarRecord>> {
        let state = self.state.lock();
        Ok(state
            .bars
            .values()
            .filter(|bar| {
                bar.instrument == instrument
                    && bar.period == period
                    && bar.period_start >= from
                    && bar.period_start <= to
            })
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use trendbar_types::{BarKey, Currency, Quote};

    const EURUSD: Instrument = Instrument::new(Currency::EUR, Currency::USD);

    fn completed_bar(minute: u32, price: f64) -> BarRecord {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap();
        let instance = BarInstance::new(BarKey::new(EURUSD, Period::Minute1), start);
        let quote = Quote::new(EURUSD, price, start + TimeDelta::seconds(1));
        BarRecord::open(&instance, &[quote]).unwrap().finalized(&[])
    }

    #[test]
    fn test_save_assigns_id() {
        let store = InMemoryBarStore::new();
        let saved = store.save(completed_bar(0, 1.1)).unwrap();

        assert!(saved.id.is_some());
        assert_eq!(store.len(), 1);
        assert_eq!(store.save_count(), 1);

        // an existing id is kept
        let again = store.save(saved).unwrap();
        assert_eq!(again.id, saved.id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_find_range_inclusive_ordered() {
        let store = InMemoryBarStore::new();
        for minute in [3, 0, 2, 1] {
            store.save(completed_bar(minute, 1.1)).unwrap();
        }

        let from = Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 1, 12, 2, 0).unwrap();
        let bars = store.find_range(EURUSD, Period::Minute1, from, to).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].period_start, from);
        assert_eq!(bars[1].period_start, to);

        let other = store.find_range(EURUSD, Period::Hour1, from, to).unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn test_fail_next_saves() {
        let store = InMemoryBarStore::new();
        store.fail_next_saves(1);

        assert!(matches!(
            store.save(completed_bar(0, 1.1)),
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.is_empty());

        store.save(completed_bar(0, 1.1)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.save_count(), 2);
    }
}
