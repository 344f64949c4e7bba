//! Range-streaming strategies.
//!
//! Three interchangeable ways to satisfy a date-range request:
//! - [`DailyStreamer`]: one remote query per untrusted day, newest first
//! - [`BulkStreamer`]: one paginated range query, partitioned into days
//! - [`HybridStreamer`]: plans gaps from the cache and picks bulk or daily per gap
//!
//! All of them buffer per-day results and emit in the requested direction, so
//! output never depends on fetch completion order.

pub mod bulk;
pub mod daily;
pub mod hybrid;

pub use bulk::BulkStreamer;
pub use daily::DailyStreamer;
pub use hybrid::HybridStreamer;

use crate::probe::{plan_probe, Prober};
use crate::session::SyncSession;
use chrono::NaiveDate;
use lifelog_core::{DayRange, Direction, Lifelog, RemoteError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Logs gathered per day, before ordering.
pub type LogsByDay = BTreeMap<NaiveDate, Vec<Lifelog>>;

/// A date-range request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub direction: Direction,
    /// Cap on emitted records. Never applied to remote queries.
    pub max_results: Option<usize>,
    /// Serve only what is cached; no remote calls, no trust checks.
    pub cache_only: bool,
}

impl RangeRequest {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            direction: Direction::default(),
            max_results: None,
            cache_only: false,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn cache_only(mut self) -> Self {
        self.cache_only = true;
        self
    }

    pub fn range(&self) -> DayRange {
        DayRange::new(self.start, self.end)
    }
}

/// Which unit of work failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// A single-day fetch.
    Day(NaiveDate),
    /// A range query over `start..=end`.
    Gap { start: NaiveDate, end: NaiveDate },
    /// The lookahead fetch of the given day.
    Probe(NaiveDate),
}

impl fmt::Display for FailureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureScope::Day(d) => write!(f, "day {d}"),
            FailureScope::Gap { start, end } => write!(f, "gap {start}..={end}"),
            FailureScope::Probe(d) => write!(f, "probe {d}"),
        }
    }
}

/// One isolated remote failure. Siblings of the failed unit still ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub scope: FailureScope,
    pub error: RemoteError,
}

/// Result of a range call: whatever was gathered, plus per-unit failures.
#[derive(Debug, Clone, Default)]
pub struct RangeOutput {
    pub logs: Vec<Lifelog>,
    pub failures: Vec<FetchFailure>,
}

impl RangeOutput {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record ids in emission order.
    pub fn ids(&self) -> Vec<&str> {
        self.logs.iter().filter_map(Lifelog::id).collect()
    }
}

/// A way of satisfying range requests.
pub trait RangeStreamingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn stream_range(&self, request: &RangeRequest) -> RangeOutput;
}

/// Strategy selector, as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    /// [`DailyStreamer`]
    PerDay,
    /// [`BulkStreamer`]
    Bulk,
    /// [`HybridStreamer`]
    #[default]
    Hybrid,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [StrategyKind::PerDay, StrategyKind::Bulk, StrategyKind::Hybrid];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::PerDay => "PER_DAY",
            StrategyKind::Bulk => "BULK",
            StrategyKind::Hybrid => "HYBRID",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PER_DAY" | "DAILY" => Ok(StrategyKind::PerDay),
            "BULK" => Ok(StrategyKind::Bulk),
            "HYBRID" => Ok(StrategyKind::Hybrid),
            other => Err(format!("unknown fetch strategy '{other}' (expected PER_DAY, BULK or HYBRID)")),
        }
    }
}

/// Flatten per-day buckets in `direction`, keeping within-day order, then
/// apply `max_results`.
pub fn order_by_direction(
    by_day: LogsByDay,
    direction: Direction,
    max_results: Option<usize>,
) -> Vec<Lifelog> {
    let cap = max_results.unwrap_or(usize::MAX);
    let days: Box<dyn Iterator<Item = Vec<Lifelog>>> = match direction {
        Direction::Asc => Box::new(by_day.into_values()),
        Direction::Desc => Box::new(by_day.into_values().rev()),
    };
    days.flatten().take(cap).collect()
}

/// Latest day with at least one record, ignoring `unsaved` days.
pub(crate) fn latest_non_empty(by_day: &LogsByDay, unsaved: &BTreeSet<NaiveDate>) -> Option<NaiveDate> {
    by_day
        .iter()
        .rev()
        .find(|(d, logs)| !logs.is_empty() && !unsaved.contains(d))
        .map(|(d, _)| *d)
}

/// Run `work` with the probe (if the policy calls for one) running alongside,
/// and join the probe before returning.
pub(crate) fn with_probe<R, F>(session: &SyncSession<'_>, range: DayRange, work: F) -> R
where
    F: FnOnce() -> R,
{
    let exec = session.execution_date();
    let scan = session.tracker().scan(exec);
    let candidate = plan_probe(range, exec, &scan, session.cache_only());

    let Some(candidate) = candidate else {
        return work();
    };

    let prober = Prober::new(session);
    std::thread::scope(|s| {
        let handle = s.spawn(|| prober.probe(candidate));
        let result = work();
        if handle.join().is_err() {
            warn!(%candidate, "probe worker panicked");
        }
        result
    })
}

/// Finish a session: post-run upgrade, ordering, failures.
pub(crate) fn finish(session: SyncSession<'_>, by_day: LogsByDay, request: &RangeRequest) -> RangeOutput {
    if !session.cache_only() {
        let run_latest = latest_non_empty(&by_day, &session.unsaved_days());
        session.upgrade_confirmations(run_latest);
    }
    RangeOutput {
        logs: order_by_direction(by_day, request.direction, request.max_results),
        failures: session.into_failures(),
    }
}

/// Build a private worker pool, or `None` to run inline.
pub(crate) fn worker_pool(workers: usize, label: &str) -> Option<rayon::ThreadPool> {
    if workers <= 1 {
        return None;
    }
    let label = label.to_string();
    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(move |i| format!("{label}-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!(error = %e, workers, "failed to build worker pool; running inline");
            None
        }
    }
}
