//! Execution-date clocks.
//!
//! The execution date is the calendar day of the current run in a
//! caller-specified timezone. It decides which days are "today" (always
//! provisional) and which are in the future (never fetched), so it is injected
//! rather than read from the system clock deep inside the sync engine.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

/// Source of the execution date.
pub trait Clock: Send + Sync {
    /// Current calendar day in `tz`.
    fn today(&self, tz: Tz) -> NaiveDate;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self, tz: Tz) -> NaiveDate {
        Utc::now().with_timezone(&tz).date_naive()
    }
}

/// Fixed clock for deterministic tests. Returns the same day in every timezone.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self, _tz: Tz) -> NaiveDate {
        self.0
    }
}
