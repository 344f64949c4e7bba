//! Behaviour-accurate in-memory remote, used by tests and offline runs.
//!
//! Mirrors the upstream API closely enough for sync logic to be exercised
//! without a network: day and datetime-range filtering by the record's date
//! prefix, days sorted by direction (seeded order within a day, whichever the
//! direction), numeric-offset cursors, and
//! a log of every query received. Failures can be injected per day or for
//! all range queries.

use super::{LifelogQuery, Page, QueryWindow, RemoteError, RemoteSource};
use crate::domain::{Direction, Lifelog};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

#[derive(Default)]
pub struct InMemorySource {
    records: RwLock<Vec<Lifelog>>,
    requests: Mutex<Vec<LifelogQuery>>,
    failing_days: RwLock<BTreeSet<NaiveDate>>,
    fail_ranges: AtomicBool,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records to the upstream data set.
    pub fn seed(&self, records: impl IntoIterator<Item = Lifelog>) {
        self.records
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .extend(records);
    }

    /// Every query received so far, in arrival order.
    pub fn requests(&self) -> Vec<LifelogQuery> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Single-day queries received for `day`.
    pub fn day_requests(&self, day: NaiveDate) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|q| q.window == QueryWindow::Day(day))
            .count()
    }

    /// Range queries received.
    pub fn range_requests(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|q| matches!(q.window, QueryWindow::Range { .. }))
            .count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }

    /// Fail every query whose window touches `day`.
    pub fn fail_on(&self, day: NaiveDate) {
        self.failing_days
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(day);
    }

    /// Fail every range query.
    pub fn fail_ranges(&self, fail: bool) {
        self.fail_ranges.store(fail, Ordering::Relaxed);
    }

    pub fn heal(&self) {
        self.failing_days
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
        self.fail_ranges.store(false, Ordering::Relaxed);
    }

    fn injected_failure(&self, window: &QueryWindow) -> Option<RemoteError> {
        if matches!(window, QueryWindow::Range { .. }) && self.fail_ranges.load(Ordering::Relaxed) {
            return Some(RemoteError::Injected("range queries disabled".into()));
        }
        let (first, last) = window.bounds();
        let failing = self.failing_days.read().unwrap_or_else(|p| p.into_inner());
        failing
            .range(first..=last)
            .next()
            .map(|day| RemoteError::Injected(format!("failure injected for {day}")))
    }
}

impl RemoteSource for InMemorySource {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn fetch_page(&self, query: &LifelogQuery) -> Result<Page, RemoteError> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(query.clone());

        if let Some(err) = self.injected_failure(&query.window) {
            return Err(err);
        }

        let (first, last) = query.window.bounds();
        let mut matching: Vec<(NaiveDate, usize, Lifelog)> = self
            .records
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .enumerate()
            .filter_map(|(seq, log)| log.data_date().ok().map(|d| (d, seq, log.clone())))
            .filter(|(d, _, _)| first <= *d && *d <= last)
            .collect();

        // Only the day order follows the direction; within a day, seeded order.
        matching.sort_by(|a, b| {
            let by_day = match query.direction {
                Direction::Asc => a.0.cmp(&b.0),
                Direction::Desc => b.0.cmp(&a.0),
            };
            by_day.then(a.1.cmp(&b.1))
        });

        let offset = match &query.cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| RemoteError::Http {
                    status: 400,
                    message: format!("invalid cursor {c:?}"),
                })?,
            None => 0,
        };
        let limit = query.limit.max(1);
        let total = matching.len();
        let end = (offset + limit).min(total);
        let records: Vec<Lifelog> = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, _, log)| log)
            .collect();
        let next_cursor = (end < total).then(|| end.to_string());

        Ok(Page {
            count: Some(records.len()),
            records,
            next_cursor,
        })
    }
}
