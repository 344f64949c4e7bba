//! Shared collaborators and per-call session state.

use crate::completeness::CompletenessTracker;
use crate::strategy::{FailureScope, FetchFailure};
use chrono::NaiveDate;
use lifelog_core::{
    CacheEntry, CacheError, CacheStore, Clock, Direction, Lifelog, LifelogQuery, QueryParams,
    RemoteError, RemoteSource,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// The store, remote, clock and query options a sync run works against.
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn CacheStore>,
    pub remote: Arc<dyn RemoteSource>,
    pub clock: Arc<dyn Clock>,
    pub params: QueryParams,
}

impl SyncContext {
    pub fn new(
        store: Arc<dyn CacheStore>,
        remote: Arc<dyn RemoteSource>,
        clock: Arc<dyn Clock>,
        params: QueryParams,
    ) -> Self {
        Self {
            store,
            remote,
            clock,
            params,
        }
    }

    /// Today in the configured timezone.
    pub fn execution_date(&self) -> NaiveDate {
        self.clock.today(self.params.timezone)
    }
}

/// State for one range call (or one single-day fetch).
///
/// Owns the memoized scan, the write lock that makes "compute stamp, write,
/// invalidate" atomic, the set of days fetched from the remote, the days
/// whose fetched logs could not be written, and the failure ledger. Shared by reference across probe and gap workers.
pub struct SyncSession<'a> {
    ctx: &'a SyncContext,
    tracker: CompletenessTracker,
    execution_date: NaiveDate,
    direction: Direction,
    cache_only: bool,
    write_lock: Mutex<()>,
    fetched: Mutex<BTreeSet<NaiveDate>>,
    unsaved: Mutex<BTreeSet<NaiveDate>>,
    failures: Mutex<Vec<FetchFailure>>,
}

impl<'a> SyncSession<'a> {
    pub fn new(ctx: &'a SyncContext, direction: Direction, cache_only: bool) -> Self {
        Self {
            ctx,
            tracker: CompletenessTracker::new(Arc::clone(&ctx.store)),
            execution_date: ctx.execution_date(),
            direction,
            cache_only,
            write_lock: Mutex::new(()),
            fetched: Mutex::new(BTreeSet::new()),
            unsaved: Mutex::new(BTreeSet::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn context(&self) -> &SyncContext {
        self.ctx
    }

    pub fn tracker(&self) -> &CompletenessTracker {
        &self.tracker
    }

    pub fn execution_date(&self) -> NaiveDate {
        self.execution_date
    }

    pub fn cache_only(&self) -> bool {
        self.cache_only
    }

    pub fn remote(&self) -> &dyn RemoteSource {
        self.ctx.remote.as_ref()
    }

    pub fn read(&self, day: NaiveDate) -> Option<CacheEntry> {
        self.ctx.store.read(day)
    }

    pub fn day_query(&self, day: NaiveDate) -> LifelogQuery {
        LifelogQuery::for_day(day, &self.ctx.params, self.direction)
    }

    pub fn range_query(&self, start: NaiveDate, end: NaiveDate) -> LifelogQuery {
        LifelogQuery::for_days(start, end, &self.ctx.params, self.direction)
    }

    /// Write freshly fetched logs for `day`, stamped with the current frontier.
    ///
    /// A failed write is remembered; see [`SyncSession::unsaved_days`].
    pub fn save_day(&self, day: NaiveDate, logs: &[Lifelog]) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let confirmed = self.tracker.confirmed_after(day, self.execution_date);
        let entry = CacheEntry::new(logs.to_vec(), day, self.execution_date, confirmed);
        let result = self.ctx.store.write(&entry);
        self.tracker.invalidate();
        if result.is_err() {
            self.unsaved.lock().unwrap_or_else(|p| p.into_inner()).insert(day);
        }
        result
    }

    /// Days fetched this session whose cache write failed. Their logs are
    /// served but never count as confirmation evidence.
    pub fn unsaved_days(&self) -> BTreeSet<NaiveDate> {
        self.unsaved.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn mark_fetched(&self, day: NaiveDate) {
        self.fetched.lock().unwrap_or_else(|p| p.into_inner()).insert(day);
    }

    pub fn fetched_days(&self) -> Vec<NaiveDate> {
        self.fetched
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .copied()
            .collect()
    }

    pub fn record_failure(&self, scope: FailureScope, error: RemoteError) {
        warn!(%scope, %error, "remote fetch failed");
        self.failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(FetchFailure { scope, error });
    }

    pub fn into_failures(self) -> Vec<FetchFailure> {
        self.failures.into_inner().unwrap_or_else(|p| p.into_inner())
    }

    /// Post-run confirmation upgrade.
    ///
    /// Every day fetched in this session that precedes the effective maximum
    /// (latest non-empty day in the cache or in this run's results) and whose
    /// stamp is absent or older gets rewritten with that maximum. Logs and
    /// `fetched_on_date` are preserved. Returns the number of upgraded days.
    pub fn upgrade_confirmations(&self, run_latest: Option<NaiveDate>) -> usize {
        let fetched = self.fetched_days();
        if fetched.is_empty() {
            return 0;
        }

        let global_latest = self.tracker.latest_non_empty(self.execution_date);
        let Some(effective_max) = global_latest.max(run_latest) else {
            return 0;
        };

        let mut upgraded = 0;
        for day in fetched.into_iter().filter(|d| *d < effective_max) {
            let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
            let Some(entry) = self.ctx.store.read(day) else {
                continue;
            };
            if entry
                .confirmed_complete_up_to_date
                .is_some_and(|c| c >= effective_max)
            {
                continue;
            }

            match self.ctx.store.write(&entry.with_confirmation(effective_max)) {
                Ok(()) => {
                    upgraded += 1;
                    debug!(%day, confirmed = %effective_max, "confirmation upgraded");
                }
                Err(e) => warn!(%day, error = %e, "confirmation upgrade write failed"),
            }
            self.tracker.invalidate();
        }

        if upgraded > 0 {
            info!(upgraded, confirmed = %effective_max, "post-run confirmation upgrade");
        }
        upgraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifelog_core::{FixedClock, InMemorySource, MemoryStore};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 7, d).unwrap()
    }

    fn context(store: Arc<MemoryStore>) -> SyncContext {
        SyncContext::new(
            store,
            Arc::new(InMemorySource::new()),
            Arc::new(FixedClock(day(15))),
            QueryParams::default(),
        )
    }

    #[test]
    fn save_day_stamps_with_later_non_empty_data() {
        let store = Arc::new(MemoryStore::new());
        let ctx = context(store.clone());
        let session = SyncSession::new(&ctx, Direction::Desc, false);

        session.save_day(day(14), &[Lifelog::stub("b", day(14))]).unwrap();
        session.save_day(day(13), &[]).unwrap();

        let e13 = store.read(day(13)).unwrap();
        assert_eq!(e13.confirmed_complete_up_to_date, Some(day(14)));
        assert_eq!(e13.fetched_on_date, day(15));
        assert!(e13.is_trusted());
        assert_eq!(store.read(day(14)).unwrap().confirmed_complete_up_to_date, None);
    }

    #[test]
    fn upgrade_rewrites_only_older_fetched_days() {
        let store = Arc::new(MemoryStore::new());
        let ctx = context(store.clone());
        let session = SyncSession::new(&ctx, Direction::Desc, false);

        // Fetched oldest first, so earlier days miss the later evidence.
        for (d, n) in [(11, 1), (12, 0), (13, 1)] {
            let logs: Vec<_> = (0..n).map(|i| Lifelog::stub(&format!("{d}-{i}"), day(d))).collect();
            session.save_day(day(d), &logs).unwrap();
            session.mark_fetched(day(d));
        }
        assert_eq!(store.read(day(11)).unwrap().confirmed_complete_up_to_date, None);

        let writes_before = store.write_count();
        assert_eq!(session.upgrade_confirmations(Some(day(13))), 2);
        assert_eq!(store.write_count(), writes_before + 2);

        for d in [11, 12] {
            let e = store.read(day(d)).unwrap();
            assert_eq!(e.confirmed_complete_up_to_date, Some(day(13)));
            assert_eq!(e.fetched_on_date, day(15));
        }
        assert_eq!(store.read(day(11)).unwrap().logs.len(), 1);
        assert_eq!(store.read(day(13)).unwrap().confirmed_complete_up_to_date, None);

        // Nothing left to do on a second pass.
        assert_eq!(session.upgrade_confirmations(Some(day(13))), 0);
    }

    #[test]
    fn upgrade_is_noop_without_fetches_or_evidence() {
        let store = Arc::new(MemoryStore::new());
        let ctx = context(store.clone());
        let session = SyncSession::new(&ctx, Direction::Desc, false);
        assert_eq!(session.upgrade_confirmations(Some(day(14))), 0);

        session.save_day(day(12), &[]).unwrap();
        session.mark_fetched(day(12));
        assert_eq!(session.upgrade_confirmations(None), 0);
        assert_eq!(store.read(day(12)).unwrap().confirmed_complete_up_to_date, None);
    }

    #[test]
    fn failures_are_collected_in_order() {
        let store = Arc::new(MemoryStore::new());
        let ctx = context(store);
        let session = SyncSession::new(&ctx, Direction::Desc, false);
        session.record_failure(FailureScope::Day(day(3)), RemoteError::Injected("a".into()));
        session.record_failure(FailureScope::Probe(day(4)), RemoteError::Injected("b".into()));

        let failures = session.into_failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].scope, FailureScope::Day(day(3)));
    }
}
