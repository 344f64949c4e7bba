//! Bulk streaming: one paginated range query instead of one per day.

use super::daily::stream_daily;
use super::{finish, with_probe, LogsByDay, RangeOutput, RangeRequest, RangeStreamingStrategy};
use crate::session::{SyncContext, SyncSession};
use crate::strategy::FailureScope;
use lifelog_core::{DayRange, RemoteError};
use tracing::{debug, info, warn};

/// Always issues a single range query for the whole request, even when every
/// day is already trusted. Cache-only requests fall back to the per-day path.
pub struct BulkStreamer {
    ctx: SyncContext,
}

impl BulkStreamer {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }
}

impl RangeStreamingStrategy for BulkStreamer {
    fn name(&self) -> &'static str {
        "bulk"
    }

    fn stream_range(&self, request: &RangeRequest) -> RangeOutput {
        if request.cache_only {
            return stream_daily(&self.ctx, request, 1);
        }

        let session = SyncSession::new(&self.ctx, request.direction, false);
        let range = request.range().clamp_end(session.execution_date());
        if range.is_empty() {
            return finish(session, LogsByDay::new(), request);
        }

        let by_day = with_probe(&session, range, || match bulk_fill(&session, range) {
            Ok(by_day) => by_day,
            Err(e) => {
                session.record_failure(
                    FailureScope::Gap {
                        start: range.start,
                        end: range.end,
                    },
                    e,
                );
                LogsByDay::new()
            }
        });
        finish(session, by_day, request)
    }
}

/// Fetch `range` with one range query, partition records by their embedded
/// date, and write an entry for every day in the range, empty ones included.
///
/// Records without a usable date, or dated outside the range, are dropped.
/// On a remote error nothing is written.
pub(crate) fn bulk_fill(session: &SyncSession<'_>, range: DayRange) -> Result<LogsByDay, RemoteError> {
    info!(%range, "bulk fetch");
    let records = session
        .remote()
        .fetch_all(&session.range_query(range.start, range.end), None)?;

    let mut by_day: LogsByDay = range.days().map(|d| (d, Vec::new())).collect();
    let mut dropped = 0usize;
    for record in records {
        match record.data_date() {
            Ok(day) if range.contains(day) => {
                if let Some(bucket) = by_day.get_mut(&day) {
                    bucket.push(record);
                }
            }
            Ok(day) => {
                debug!(%day, %range, "bulk record outside range dropped");
                dropped += 1;
            }
            Err(e) => {
                debug!(error = %e, id = ?record.id(), "bulk record without usable date dropped");
                dropped += 1;
            }
        }
    }

    // Newest first, so each write already sees the later days' evidence.
    let exec = session.execution_date();
    for (day, logs) in by_day.iter().rev() {
        if *day > exec {
            continue;
        }
        match session.save_day(*day, logs) {
            Ok(()) => session.mark_fetched(*day),
            Err(e) => warn!(%day, error = %e, "failed to cache bulk day"),
        }
    }

    debug!(days = by_day.len(), dropped, "bulk partitioned");
    Ok(by_day)
}
