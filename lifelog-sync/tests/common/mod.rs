//! Shared fixture: memory store, in-memory remote and a fixed clock.

#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use lifelog_core::{
    CacheEntry, CacheError, CacheStore, FixedClock, InMemorySource, Lifelog, MemoryStore, QueryParams, ScanMap,
};
use lifelog_sync::{
    BulkStreamer, DailyStreamer, HybridStreamer, RangeStreamingStrategy, StrategyKind, SyncContext,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Execution date for every scenario: 2023-07-15.
pub fn exec() -> NaiveDate {
    day(15)
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 7, d).unwrap()
}

pub fn days_before_exec(n: u64) -> NaiveDate {
    exec() - Days::new(n)
}

/// One record per day, id `log_YYYY-MM-DD`.
pub fn daily_log(d: NaiveDate) -> Lifelog {
    Lifelog::stub(&format!("log_{d}"), d)
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub remote: Arc<InMemorySource>,
    pub ctx: SyncContext,
}

impl Fixture {
    pub fn new() -> Self {
        Self::at(exec())
    }

    pub fn at(exec: NaiveDate) -> Self {
        Self::build(exec, BTreeSet::new())
    }

    /// Cache writes for `days` fail; everything else goes to `store`.
    pub fn with_write_failures(days: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self::build(exec(), days.into_iter().collect())
    }

    fn build(exec: NaiveDate, failing: BTreeSet<NaiveDate>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(InMemorySource::new());
        let backend: Arc<dyn CacheStore> = if failing.is_empty() {
            store.clone()
        } else {
            Arc::new(WriteFailingStore {
                inner: store.clone(),
                failing,
            })
        };
        let ctx = SyncContext::new(backend, remote.clone(), Arc::new(FixedClock(exec)), QueryParams::default());
        Self { store, remote, ctx }
    }

    pub fn seed(&self, logs: impl IntoIterator<Item = Lifelog>) -> &Self {
        self.remote.seed(logs);
        self
    }

    /// Put a structured entry straight into the cache.
    pub fn cache(&self, d: NaiveDate, logs: Vec<Lifelog>, confirmed: Option<NaiveDate>) {
        self.store
            .write(&CacheEntry::new(logs, d, exec(), confirmed))
            .unwrap();
    }

    pub fn entry(&self, d: NaiveDate) -> Option<CacheEntry> {
        self.store.read(d)
    }

    pub fn stamp(&self, d: NaiveDate) -> Option<NaiveDate> {
        self.entry(d).and_then(|e| e.confirmed_complete_up_to_date)
    }

    pub fn strategy(&self, kind: StrategyKind) -> Box<dyn RangeStreamingStrategy> {
        match kind {
            StrategyKind::PerDay => Box::new(DailyStreamer::new(self.ctx.clone())),
            StrategyKind::Bulk => Box::new(BulkStreamer::new(self.ctx.clone())),
            StrategyKind::Hybrid => Box::new(HybridStreamer::new(self.ctx.clone())),
        }
    }
}

/// Memory store whose writes fail for selected days.
struct WriteFailingStore {
    inner: Arc<MemoryStore>,
    failing: BTreeSet<NaiveDate>,
}

impl CacheStore for WriteFailingStore {
    fn name(&self) -> &str {
        "write_failing"
    }

    fn read(&self, day: NaiveDate) -> Option<CacheEntry> {
        self.inner.read(day)
    }

    fn write(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        if self.failing.contains(&entry.data_date) {
            return Err(CacheError::Serialize(format!("disk full writing {}", entry.data_date)));
        }
        self.inner.write(entry)
    }

    fn scan(&self, execution_date: NaiveDate) -> ScanMap {
        self.inner.scan(execution_date)
    }
}
