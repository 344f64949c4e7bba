//! Gap planning for the hybrid strategy.
//!
//! Splits a range into maximal runs of days that need the remote ("gaps") and
//! picks bulk or per-day execution for each.

use chrono::NaiveDate;
use lifelog_core::domain::next_day;
use lifelog_core::{DayRange, ScanMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a gap is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapStrategy {
    /// One paginated range query covering the whole gap.
    Bulk,
    /// One query per day, newest first.
    Daily,
}

impl fmt::Display for GapStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapStrategy::Bulk => f.write_str("bulk"),
            GapStrategy::Daily => f.write_str("daily"),
        }
    }
}

/// A maximal run of consecutive days lacking trustworthy cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub strategy: GapStrategy,
}

impl Gap {
    pub fn range(&self) -> DayRange {
        DayRange::new(self.start, self.end)
    }

    pub fn len(&self) -> usize {
        self.range().len()
    }

    pub fn is_empty(&self) -> bool {
        self.range().is_empty()
    }
}

/// Finds gaps in a range and sizes each as bulk or daily.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapPlanner {
    /// Gaps at least this long go bulk.
    pub min_bulk_days: usize,
    /// Gaps covering at least this share of the range go bulk.
    pub bulk_ratio: f64,
}

impl Default for GapPlanner {
    fn default() -> Self {
        Self {
            min_bulk_days: 3,
            bulk_ratio: 0.4,
        }
    }
}

/// Whether `day` must come from the remote: today, uncached, or not
/// confirmed by a strictly later day.
pub fn needs_remote(day: NaiveDate, execution_date: NaiveDate, scan: &ScanMap) -> bool {
    day == execution_date || !scan.get(&day).is_some_and(|status| status.is_trusted(day))
}

impl GapPlanner {
    pub fn new(min_bulk_days: usize, bulk_ratio: f64) -> Self {
        Self {
            min_bulk_days,
            bulk_ratio,
        }
    }

    /// Gaps within `[start, min(end, execution_date)]`, ascending.
    pub fn plan(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        execution_date: NaiveDate,
        scan: &ScanMap,
    ) -> Vec<Gap> {
        let effective = DayRange::new(start, end).clamp_end(execution_date);
        let total_days = effective.len();
        if total_days == 0 {
            return Vec::new();
        }

        let mut runs: Vec<(NaiveDate, NaiveDate)> = Vec::new();
        for day in effective.days().filter(|d| needs_remote(*d, execution_date, scan)) {
            match runs.last_mut() {
                Some((_, run_end)) if next_day(*run_end) == day => *run_end = day,
                _ => runs.push((day, day)),
            }
        }

        runs.into_iter()
            .map(|(gap_start, gap_end)| {
                let gap_days = DayRange::new(gap_start, gap_end).len();
                let ratio = gap_days as f64 / total_days as f64;
                let strategy = if gap_days >= self.min_bulk_days || ratio >= self.bulk_ratio {
                    GapStrategy::Bulk
                } else {
                    GapStrategy::Daily
                };
                Gap {
                    start: gap_start,
                    end: gap_end,
                    strategy,
                }
            })
            .collect()
    }
}
