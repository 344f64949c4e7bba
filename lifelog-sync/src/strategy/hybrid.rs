//! Hybrid streaming: plan gaps from the cache, fill each with bulk or daily.

use super::bulk::bulk_fill;
use super::daily::{fetch_days, stream_daily};
use super::{finish, with_probe, worker_pool, LogsByDay, RangeOutput, RangeRequest, RangeStreamingStrategy};
use crate::planner::{Gap, GapPlanner, GapStrategy};
use crate::session::{SyncContext, SyncSession};
use crate::strategy::FailureScope;
use rayon::prelude::*;
use tracing::debug;

/// Fills only the days the cache cannot vouch for.
///
/// The planner groups those days into gaps. Long gaps go through one range
/// query, short ones day by day, and independent gaps run on a small worker
/// pool alongside the probe.
pub struct HybridStreamer {
    ctx: SyncContext,
    planner: GapPlanner,
    max_workers: usize,
}

impl HybridStreamer {
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            ctx,
            planner: GapPlanner::default(),
            max_workers: 3,
        }
    }

    pub fn with_planner(mut self, planner: GapPlanner) -> Self {
        self.planner = planner;
        self
    }

    /// Gaps run concurrently on at most this many workers.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }
}

impl RangeStreamingStrategy for HybridStreamer {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn stream_range(&self, request: &RangeRequest) -> RangeOutput {
        if request.cache_only {
            return stream_daily(&self.ctx, request, 1);
        }

        let session = SyncSession::new(&self.ctx, request.direction, false);
        let exec = session.execution_date();
        let range = request.range().clamp_end(exec);
        if range.is_empty() {
            return finish(session, LogsByDay::new(), request);
        }

        let scan = session.tracker().scan(exec);
        let plan = self.planner.plan(range.start, range.end, exec, &scan);
        debug!(%range, gaps = plan.len(), ?plan, "hybrid plan");

        let by_day = with_probe(&session, range, || {
            let filled: Vec<LogsByDay> = match worker_pool(self.max_workers.min(plan.len()), "lifelog-gap") {
                Some(pool) => pool.install(|| plan.par_iter().map(|gap| execute_gap(&session, gap)).collect()),
                None => plan.iter().map(|gap| execute_gap(&session, gap)).collect(),
            };

            let mut by_day: LogsByDay = filled.into_iter().flatten().collect();
            for day in range.days() {
                by_day
                    .entry(day)
                    .or_insert_with(|| session.read(day).map(|e| e.logs).unwrap_or_default());
            }
            by_day
        });
        finish(session, by_day, request)
    }
}

/// Fill one gap with its assigned sub-strategy. The result covers every day of
/// the gap; a failed bulk gap leaves them all empty.
fn execute_gap(session: &SyncSession<'_>, gap: &Gap) -> LogsByDay {
    debug!(start = %gap.start, end = %gap.end, strategy = %gap.strategy, "executing gap");
    match gap.strategy {
        GapStrategy::Bulk => match bulk_fill(session, gap.range()) {
            Ok(by_day) => by_day,
            Err(e) => {
                session.record_failure(
                    FailureScope::Gap {
                        start: gap.start,
                        end: gap.end,
                    },
                    e,
                );
                gap.range().days().map(|d| (d, Vec::new())).collect()
            }
        },
        GapStrategy::Daily => {
            let days: Vec<_> = gap.range().days().rev().collect();
            fetch_days(session, &days, 1)
        }
    }
}
