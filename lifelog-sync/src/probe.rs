//! Smart probe: manufacture completeness evidence for a range.
//!
//! A probe asks the remote for a single record on the day after the range.
//! If one exists it is cached, and every earlier day's frontier moves past the
//! range. An empty answer proves nothing and is never cached.

use crate::session::SyncSession;
use crate::strategy::FailureScope;
use chrono::NaiveDate;
use lifelog_core::domain::next_day;
use lifelog_core::{DayRange, ScanMap};
use std::ops::Bound::{Excluded, Unbounded};
use tracing::{debug, info, warn};

/// Day to probe for `range`, or `None` when no probe is warranted.
///
/// `range` is the effective range, already clamped to the execution date. A
/// probe is issued only when all of these hold:
/// - not cache-only
/// - no cached day in the range already carries a stamp past the range
/// - no cached day after the range has non-empty logs
/// - some day in the range precedes the execution date
/// - some such day is not yet trusted
///
/// The candidate is the day after the range, capped at the execution date;
/// a candidate inside the range is fetched as "today" anyway and not probed.
pub fn plan_probe(
    range: DayRange,
    execution_date: NaiveDate,
    scan: &ScanMap,
    cache_only: bool,
) -> Option<NaiveDate> {
    if cache_only || range.is_empty() {
        return None;
    }

    let already_beyond = scan
        .range(range.start..=range.end)
        .any(|(_, status)| status.confirmed_up_to.is_some_and(|c| c > range.end));
    if already_beyond {
        return None;
    }

    let later_data = scan
        .range((Excluded(range.end), Unbounded))
        .any(|(_, status)| status.has_logs);
    if later_data {
        return None;
    }

    if range.start >= execution_date {
        return None;
    }

    let all_trusted = range
        .days()
        .filter(|d| *d < execution_date)
        .all(|d| scan.get(&d).is_some_and(|status| status.is_trusted(d)));
    if all_trusted {
        return None;
    }

    let candidate = next_day(range.end).min(execution_date);
    (!range.contains(candidate)).then_some(candidate)
}

/// Issues probes on behalf of a session.
pub struct Prober<'s, 'a> {
    session: &'s SyncSession<'a>,
}

impl<'s, 'a> Prober<'s, 'a> {
    pub fn new(session: &'s SyncSession<'a>) -> Self {
        Self { session }
    }

    /// True iff non-empty data was found for `candidate` and cached.
    pub fn probe(&self, candidate: NaiveDate) -> bool {
        let query = self.session.day_query(candidate).with_limit(1);
        match self.session.remote().fetch_all(&query, Some(1)) {
            Ok(logs) if logs.is_empty() => {
                debug!(%candidate, "probe found no data");
                false
            }
            Ok(logs) => match self.session.save_day(candidate, &logs) {
                Ok(()) => {
                    info!(%candidate, "probe found data; frontier advanced");
                    true
                }
                Err(e) => {
                    warn!(%candidate, error = %e, "failed to cache probe result");
                    false
                }
            },
            Err(e) => {
                self.session.record_failure(FailureScope::Probe(candidate), e);
                false
            }
        }
    }
}
