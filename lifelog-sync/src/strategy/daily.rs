//! Per-day streaming.

use super::{finish, with_probe, worker_pool, LogsByDay, RangeOutput, RangeRequest, RangeStreamingStrategy};
use crate::fetch::fetch_day;
use crate::session::{SyncContext, SyncSession};
use crate::strategy::FailureScope;
use chrono::NaiveDate;
use lifelog_core::Lifelog;
use rayon::prelude::*;
use tracing::debug;

/// One remote query per day that needs it.
///
/// Days are processed newest first, so a trustworthy frontier near today is
/// found early; output is buffered and re-emitted in the requested direction.
pub struct DailyStreamer {
    ctx: SyncContext,
    workers: usize,
}

impl DailyStreamer {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx, workers: 1 }
    }

    /// Fetch up to `workers` days at once on a private pool.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

impl RangeStreamingStrategy for DailyStreamer {
    fn name(&self) -> &'static str {
        "per_day"
    }

    fn stream_range(&self, request: &RangeRequest) -> RangeOutput {
        stream_daily(&self.ctx, request, self.workers)
    }
}

/// The per-day path, shared with the other strategies for cache-only requests.
pub(crate) fn stream_daily(ctx: &SyncContext, request: &RangeRequest, workers: usize) -> RangeOutput {
    let session = SyncSession::new(ctx, request.direction, request.cache_only);
    let exec = session.execution_date();
    let range = if request.cache_only {
        request.range()
    } else {
        request.range().clamp_end(exec)
    };
    debug!(%range, workers, cache_only = request.cache_only, "per-day stream");

    let days: Vec<NaiveDate> = range.days().rev().collect();
    let by_day = with_probe(&session, range, || fetch_days(&session, &days, workers));
    finish(session, by_day, request)
}

/// Serve each day through the fetch policy. A failed day is recorded and
/// yields no logs; its siblings are unaffected.
pub(crate) fn fetch_days(session: &SyncSession<'_>, days: &[NaiveDate], workers: usize) -> LogsByDay {
    let fetch_one = |day: NaiveDate| -> (NaiveDate, Vec<Lifelog>) {
        match fetch_day(session, day) {
            Ok(logs) => (day, logs),
            Err(e) => {
                session.record_failure(FailureScope::Day(day), e);
                (day, Vec::new())
            }
        }
    };

    match worker_pool(workers.min(days.len()), "lifelog-day") {
        Some(pool) => pool.install(|| days.par_iter().map(|d| fetch_one(*d)).collect()),
        None => days.iter().map(|d| fetch_one(*d)).collect(),
    }
}
