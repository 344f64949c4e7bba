//! Confirmation frontier: which cached days are known complete.
//!
//! A past day is only ever declared complete by observed non-empty data on a
//! strictly later day. Elapsed time alone never counts.

use chrono::NaiveDate;
use lifelog_core::{CacheStore, ScanMap};
use std::collections::HashMap;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::{Arc, Mutex};

/// Memoized store scans, keyed by execution date.
///
/// Every write through the owning session must call [`ScanCache::invalidate`].
/// A scan that was in flight when an invalidation happened is returned to its
/// caller but not memoized.
pub struct ScanCache {
    store: Arc<dyn CacheStore>,
    inner: Mutex<Memo>,
}

#[derive(Default)]
struct Memo {
    generation: u64,
    scans: HashMap<NaiveDate, Arc<ScanMap>>,
}

impl ScanCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            inner: Mutex::new(Memo::default()),
        }
    }

    pub fn scan(&self, execution_date: NaiveDate) -> Arc<ScanMap> {
        let generation = {
            let memo = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(hit) = memo.scans.get(&execution_date) {
                return Arc::clone(hit);
            }
            memo.generation
        };

        let fresh = Arc::new(self.store.scan(execution_date));

        let mut memo = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if memo.generation == generation {
            memo.scans.insert(execution_date, Arc::clone(&fresh));
        }
        fresh
    }

    pub fn invalidate(&self) {
        let mut memo = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        memo.generation += 1;
        memo.scans.clear();
    }
}

/// Queries over the confirmation frontier.
pub struct CompletenessTracker {
    scans: ScanCache,
}

impl CompletenessTracker {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            scans: ScanCache::new(store),
        }
    }

    pub fn scan(&self, execution_date: NaiveDate) -> Arc<ScanMap> {
        self.scans.scan(execution_date)
    }

    pub fn invalidate(&self) {
        self.scans.invalidate();
    }

    /// Latest day after `day` (and on or before `execution_date`) with
    /// non-empty cached logs.
    pub fn confirmed_after(&self, day: NaiveDate, execution_date: NaiveDate) -> Option<NaiveDate> {
        let scan = self.scan(execution_date);
        scan.range((Excluded(day), Unbounded))
            .rev()
            .find(|(_, status)| status.has_logs)
            .map(|(d, _)| *d)
    }

    /// Latest day on or before `execution_date` with non-empty cached logs.
    pub fn latest_non_empty(&self, execution_date: NaiveDate) -> Option<NaiveDate> {
        let scan = self.scan(execution_date);
        scan.iter()
            .rev()
            .find(|(_, status)| status.has_logs)
            .map(|(d, _)| *d)
    }
}
