//! Remote lifelog source: typed queries, pagination, and structured errors.
//!
//! The [`RemoteSource`] trait abstracts over the upstream service so the sync
//! layer can run against the real HTTP API or a behaviour-accurate in-memory
//! fake without changing.

pub mod circuit_breaker;
pub mod http;
pub mod memory;

pub use circuit_breaker::CircuitBreaker;
pub use http::{HttpConfig, HttpSource};
pub use memory::InMemorySource;

use crate::domain::{Direction, Lifelog};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timezone used when none is configured.
pub const DEFAULT_TIMEZONE: chrono_tz::Tz = chrono_tz::America::Detroit;

/// Records requested per page when none is configured.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Structured error types for remote queries.
///
/// Every variant is a failure after transport-level retries were exhausted.
/// Callers surface it for the affected day or range only and never cache it
/// as an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// HTTP 429 that outlasted the retries.
    #[error("rate limited by upstream (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// The circuit breaker is open; no calls until its cooldown ends.
    #[error("hard stop: upstream has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    /// Raised by [`InMemorySource`] on request.
    #[error("injected failure: {0}")]
    Injected(String),
}

/// The time window a query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryWindow {
    /// One calendar day in the query's timezone.
    Day(NaiveDate),
    /// Inclusive local datetime bounds.
    Range {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl QueryWindow {
    /// Whole days `start 00:00:00` through `end 23:59:59`.
    pub fn days(start: NaiveDate, end: NaiveDate) -> Self {
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        QueryWindow::Range {
            start: start.and_time(NaiveTime::MIN),
            end: end.and_time(last_second),
        }
    }

    /// First and last calendar day covered.
    pub fn bounds(&self) -> (NaiveDate, NaiveDate) {
        match *self {
            QueryWindow::Day(day) => (day, day),
            QueryWindow::Range { start, end } => (start.date(), end.date()),
        }
    }
}

/// Query options shared by every request of a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub timezone: chrono_tz::Tz,
    pub page_limit: usize,
    pub include_markdown: bool,
    pub include_headings: bool,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            page_limit: DEFAULT_PAGE_LIMIT,
            include_markdown: true,
            include_headings: true,
        }
    }
}

/// One page request against the upstream API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifelogQuery {
    pub window: QueryWindow,
    pub timezone: chrono_tz::Tz,
    pub direction: Direction,
    pub limit: usize,
    pub cursor: Option<String>,
    pub include_markdown: bool,
    pub include_headings: bool,
}

impl LifelogQuery {
    pub fn new(window: QueryWindow, params: &QueryParams, direction: Direction) -> Self {
        Self {
            window,
            timezone: params.timezone,
            direction,
            limit: params.page_limit,
            cursor: None,
            include_markdown: params.include_markdown,
            include_headings: params.include_headings,
        }
    }

    pub fn for_day(day: NaiveDate, params: &QueryParams, direction: Direction) -> Self {
        Self::new(QueryWindow::Day(day), params, direction)
    }

    pub fn for_days(start: NaiveDate, end: NaiveDate, params: &QueryParams, direction: Direction) -> Self {
        Self::new(QueryWindow::days(start, end), params, direction)
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Query-string pairs in the upstream API's vocabulary.
    ///
    /// Inclusion flags are only sent when disabled.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(8);
        match self.window {
            QueryWindow::Day(day) => pairs.push(("date", day.format("%Y-%m-%d").to_string())),
            QueryWindow::Range { start, end } => {
                pairs.push(("start", start.format("%Y-%m-%d %H:%M:%S").to_string()));
                pairs.push(("end", end.format("%Y-%m-%d %H:%M:%S").to_string()));
            }
        }
        pairs.push(("timezone", self.timezone.name().to_string()));
        pairs.push(("direction", self.direction.as_str().to_string()));
        pairs.push(("limit", self.limit.to_string()));
        if let Some(cursor) = &self.cursor {
            pairs.push(("cursor", cursor.clone()));
        }
        if !self.include_markdown {
            pairs.push(("includeMarkdown", "false".to_string()));
        }
        if !self.include_headings {
            pairs.push(("includeHeadings", "false".to_string()));
        }
        pairs
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub records: Vec<Lifelog>,
    /// Absent on the last page.
    pub next_cursor: Option<String>,
    /// Count reported by the upstream for this page.
    pub count: Option<usize>,
}

/// Paginated query capability.
pub trait RemoteSource: Send + Sync {
    /// Human-readable source name (e.g. "limitless_http").
    fn name(&self) -> &str;

    /// Fetch a single page.
    fn fetch_page(&self, query: &LifelogQuery) -> Result<Page, RemoteError>;

    /// Follow cursors until the last page, or until `max_results` records
    /// have been collected.
    fn fetch_all(
        &self,
        query: &LifelogQuery,
        max_results: Option<usize>,
    ) -> Result<Vec<Lifelog>, RemoteError> {
        let mut records = Vec::new();
        let mut cursor = query.cursor.clone();

        loop {
            let limit = match max_results {
                Some(max) => query.limit.min(max.saturating_sub(records.len())),
                None => query.limit,
            };
            let page_query = query.clone().with_cursor(cursor).with_limit(limit.max(1));
            let page = self.fetch_page(&page_query)?;
            let received = page.records.len();
            records.extend(page.records);

            if let Some(max) = max_results {
                if records.len() >= max {
                    records.truncate(max);
                    break;
                }
            }
            match page.next_cursor {
                Some(next) if received > 0 => cursor = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }
}
