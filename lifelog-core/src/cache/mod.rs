//! Day-partitioned cache of lifelog records.
//!
//! Each calendar day maps to one [`CacheEntry`]. Entries are replaced whole on
//! every write; the only in-place change ever made is a confirmation-stamp
//! upgrade, which is itself a full rewrite.

pub mod entry;
pub mod filesystem;
pub mod memory;
pub mod store;

pub use entry::{decode_entry, encode_entry, CacheEntry};
pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use store::{CacheStore, DayStatus, ScanMap};

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by cache backends.
///
/// `Corrupt` never escapes a [`CacheStore::read`]: the store logs it, deletes
/// the entry and reports a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize cache entry: {0}")]
    Serialize(String),

    #[error("corrupt cache entry for {day}: {reason}")]
    Corrupt { day: NaiveDate, reason: String },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
