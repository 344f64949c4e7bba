//! Filesystem cache backend, partitioned by year and month.
//!
//! Layout: `{root}/{YYYY}/{MM}/{YYYY-MM-DD}.json`
//!
//! - Atomic writes (write to `.json.tmp`, rename into place)
//! - Corrupt entries are deleted on read (repair-on-read)
//! - Scans walk only year/month directories and date-named files

use super::entry::{decode_entry, encode_entry};
use super::store::{CacheStore, DayStatus, ScanMap};
use super::{CacheEntry, CacheError};
use chrono::{Datelike, NaiveDate};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Per-day JSON files under a root directory.
pub struct FilesystemStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `~/.limitless/cache`, or a relative `.limitless/cache` when no home
    /// directory can be determined.
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".limitless")
            .join("cache")
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `day`: `{root}/{YYYY}/{MM}/{YYYY-MM-DD}.json`
    pub fn day_path(&self, day: NaiveDate) -> PathBuf {
        self.root
            .join(format!("{:04}", day.year()))
            .join(format!("{:02}", day.month()))
            .join(format!("{day}.json"))
    }

    /// Delete `path` if it still holds `observed`. A writer that replaced the
    /// file since it was read wins.
    fn remove_corrupt(&self, path: &Path, observed: &[u8], err: &CacheError) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match fs::read(path) {
            Ok(current) if current == observed => {}
            Ok(_) => {
                debug!(path = %path.display(), "corrupt entry replaced concurrently; keeping it");
                return;
            }
            Err(_) => return,
        }

        warn!(path = %path.display(), error = %err, "deleting corrupt cache entry");
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to delete corrupt cache entry");
        }
    }

    fn month_dirs(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for year_dir in child_dirs(&self.root, 4) {
            out.extend(child_dirs(&year_dir, 2));
        }
        out
    }
}

impl CacheStore for FilesystemStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn read(&self, day: NaiveDate) -> Option<CacheEntry> {
        let path = self.day_path(day);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache read failed");
                return None;
            }
        };

        match decode_entry(&bytes, day) {
            Ok(entry) => Some(entry),
            Err(err) => {
                self.remove_corrupt(&path, &bytes, &err);
                None
            }
        }
    }

    fn write(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let bytes = encode_entry(entry)?;
        let path = self.day_path(entry.data_date);
        let tmp_path = path.with_extension("json.tmp");

        // A poisoned lock only means another writer panicked; the files are intact.
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;
        }
        fs::write(&tmp_path, &bytes).map_err(|e| CacheError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CacheError::io(&path, e)
        })?;

        debug!(day = %entry.data_date, logs = entry.logs.len(), "cache entry written");
        Ok(())
    }

    fn scan(&self, execution_date: NaiveDate) -> ScanMap {
        let mut map = ScanMap::new();

        for month_dir in self.month_dirs() {
            let Ok(files) = fs::read_dir(&month_dir) else {
                continue;
            };
            for file in files.flatten() {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(day) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                else {
                    continue;
                };
                if day > execution_date {
                    continue;
                }

                let decoded = fs::read(&path)
                    .map_err(|e| CacheError::io(&path, e))
                    .and_then(|bytes| decode_entry(&bytes, day));
                match decoded {
                    Ok(entry) => {
                        map.insert(day, DayStatus::of(&entry));
                    }
                    Err(e) => debug!(path = %path.display(), error = %e, "scan skipped entry"),
                }
            }
        }

        map
    }
}

/// Subdirectories of `dir` whose names are exactly `width` ASCII digits.
fn child_dirs(dir: &Path, width: usize) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.len() == width && n.bytes().all(|b| b.is_ascii_digit()))
                .unwrap_or(false)
        })
        .map(|e| e.path())
        .collect()
}
