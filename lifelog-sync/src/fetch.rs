//! Per-day fetch policy.

use crate::session::SyncSession;
use chrono::NaiveDate;
use lifelog_core::{CacheEntry, Lifelog, RemoteError};
use tracing::{debug, info, warn};

/// What to do for one day, decided from the cache alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDecision {
    /// After the execution date: nothing to fetch, nothing to write.
    SkipFuture,
    /// Cache-only mode: the entry's logs verbatim (or nothing), no trust check.
    UseCacheForced,
    /// The execution date itself is always provisional.
    RefetchToday,
    UseTrustedCache,
    Refetch,
}

impl FetchDecision {
    pub fn hits_remote(self) -> bool {
        matches!(self, FetchDecision::RefetchToday | FetchDecision::Refetch)
    }
}

/// Decide how to serve `day`. Rules apply in order; the first match wins.
pub fn decide(
    day: NaiveDate,
    execution_date: NaiveDate,
    cache_only: bool,
    entry: Option<&CacheEntry>,
) -> FetchDecision {
    if day > execution_date && !cache_only {
        FetchDecision::SkipFuture
    } else if cache_only {
        FetchDecision::UseCacheForced
    } else if day == execution_date {
        FetchDecision::RefetchToday
    } else if entry.is_some_and(CacheEntry::is_trusted) {
        FetchDecision::UseTrustedCache
    } else {
        FetchDecision::Refetch
    }
}

/// Serve one day through the session: cache when permitted, remote otherwise.
///
/// A remote result is written even when empty, so an observed "no events" day
/// is distinguishable from a never-fetched one. A remote error writes nothing.
pub fn fetch_day(session: &SyncSession<'_>, day: NaiveDate) -> Result<Vec<Lifelog>, RemoteError> {
    let exec = session.execution_date();
    let entry = if day > exec && !session.cache_only() {
        None
    } else {
        session.read(day)
    };

    let decision = decide(day, exec, session.cache_only(), entry.as_ref());
    match decision {
        FetchDecision::SkipFuture => {
            debug!(%day, "skipping future day");
            Ok(Vec::new())
        }
        FetchDecision::UseCacheForced | FetchDecision::UseTrustedCache => {
            debug!(%day, ?decision, hit = entry.is_some(), "serving from cache");
            Ok(entry.map(|e| e.logs).unwrap_or_default())
        }
        FetchDecision::RefetchToday | FetchDecision::Refetch => {
            info!(%day, ?decision, "fetching day from remote");
            let logs = session.remote().fetch_all(&session.day_query(day), None)?;
            match session.save_day(day, &logs) {
                Ok(()) => session.mark_fetched(day),
                Err(e) => warn!(%day, error = %e, "failed to cache fetched day"),
            }
            Ok(logs)
        }
    }
}
