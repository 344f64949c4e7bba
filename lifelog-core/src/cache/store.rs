//! The backend-agnostic cache contract.

use super::{CacheEntry, CacheError};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// What a scan knows about one cached day without keeping its logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayStatus {
    pub has_logs: bool,
    pub confirmed_up_to: Option<NaiveDate>,
}

impl DayStatus {
    pub fn of(entry: &CacheEntry) -> Self {
        Self {
            has_logs: entry.has_logs(),
            confirmed_up_to: entry.confirmed_complete_up_to_date,
        }
    }

    /// Same rule as [`CacheEntry::is_trusted`], for a day known only by its status.
    pub fn is_trusted(&self, day: NaiveDate) -> bool {
        matches!(self.confirmed_up_to, Some(c) if c > day)
    }
}

/// Scan result, ordered by day.
pub type ScanMap = BTreeMap<NaiveDate, DayStatus>;

/// Durable day → entry store.
///
/// Backends must be interchangeable: the sync layer only ever talks to this
/// trait. Implementations serialize their own writes; callers that need a
/// read-modify-write sequence to be atomic hold a lock of their own around it.
pub trait CacheStore: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// The entry for `day`, or `None` when absent.
    ///
    /// A corrupt entry is deleted and reported as absent.
    fn read(&self, day: NaiveDate) -> Option<CacheEntry>;

    /// Replace the entry for `entry.data_date` atomically.
    fn write(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Status of every readable entry dated on or before `execution_date`.
    ///
    /// Unreadable or corrupt entries are skipped, not repaired.
    fn scan(&self, execution_date: NaiveDate) -> ScanMap;
}
