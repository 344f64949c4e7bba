//! In-memory cache backend.
//!
//! Holds encoded payloads rather than decoded entries, so legacy and corrupt
//! bytes injected with [`MemoryStore::insert_raw`] go through the same decode
//! and repair path as files on disk.

use super::entry::{decode_entry, encode_entry};
use super::store::{CacheStore, DayStatus, ScanMap};
use super::{CacheEntry, CacheError};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tracing::{debug, warn};

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<NaiveDate, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw payload bytes for `day`, bypassing the encoder.
    pub fn insert_raw(&self, day: NaiveDate, bytes: impl Into<Vec<u8>>) {
        self.entries
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(day, bytes.into());
    }

    /// Raw payload bytes for `day`.
    pub fn raw(&self, day: NaiveDate) -> Option<Vec<u8>> {
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&day)
            .cloned()
    }

    /// Number of successful [`CacheStore::write`] calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(|p| p.into_inner()).clear();
    }

    /// Days currently stored, ascending.
    pub fn days(&self) -> Vec<NaiveDate> {
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .copied()
            .collect()
    }
}

impl MemoryStore {
    /// Drop the payload for `day` only if it is still `observed`.
    fn remove_corrupt(&self, day: NaiveDate, observed: &[u8], err: &CacheError) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        if entries.get(&day).map(Vec::as_slice) != Some(observed) {
            debug!(%day, "corrupt entry replaced concurrently; keeping it");
            return;
        }
        warn!(%day, error = %err, "deleting corrupt cache entry");
        entries.remove(&day);
    }
}

impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn read(&self, day: NaiveDate) -> Option<CacheEntry> {
        let bytes = self.raw(day)?;
        match decode_entry(&bytes, day) {
            Ok(entry) => Some(entry),
            Err(err) => {
                self.remove_corrupt(day, &bytes, &err);
                None
            }
        }
    }

    fn write(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let bytes = encode_entry(entry)?;
        self.entries
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(entry.data_date, bytes);
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!(day = %entry.data_date, logs = entry.logs.len(), "cache entry written");
        Ok(())
    }

    fn scan(&self, execution_date: NaiveDate) -> ScanMap {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries
            .range(..=execution_date)
            .filter_map(|(day, bytes)| {
                decode_entry(bytes, *day)
                    .ok()
                    .map(|entry| (*day, DayStatus::of(&entry)))
            })
            .collect()
    }
}
