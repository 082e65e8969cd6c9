//! Append-only run log and the per-source watermark derived from it.
//!
//! The log is a CSV table with one row per source per fetch invocation:
//!
//! ```text
//! run_id,rss_url_id,date,response,item_count
//! 1,1,2024-01-05 09:00:00,200,3
//! ```
//!
//! A source's watermark is the latest `date` among its rows, whatever their
//! status or item count.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const LOG_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

mod log_date {
    use super::LOG_DATE_FORMAT;
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(LOG_DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(raw.trim(), LOG_DATE_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| de::Error::custom(format!("bad log date {:?}: {}", raw, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub run_id: u64,
    #[serde(rename = "rss_url_id")]
    pub source_id: i64,
    #[serde(rename = "date", with = "log_date")]
    pub run_timestamp: DateTime<Utc>,
    #[serde(rename = "response")]
    pub http_status: u16,
    pub item_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunLog {
    entries: Vec<RunLogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<RunLogEntry>) -> Self {
        Self { entries }
    }

    /// Read the log table. A missing file is an empty log.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open run log: {}", path.display()))?;
        let entries = reader
            .deserialize()
            .collect::<Result<Vec<RunLogEntry>, _>>()
            .with_context(|| format!("Failed to parse run log: {}", path.display()))?;
        Ok(Self { entries })
    }

    /// Rewrite the whole table. Writes a sibling temp file and renames it over
    /// the target so a crash never leaves a half-written log.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp = sibling(path, "tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)
                .with_context(|| format!("Failed to create {}", tmp.display()))?;
            for entry in &self.entries {
                writer.serialize(entry)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace run log: {}", path.display()))?;
        Ok(())
    }

    pub fn entries(&self) -> &[RunLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All-time max run_id + 1, or 1 for an empty log.
    pub fn next_run_id(&self) -> u64 {
        self.entries.iter().map(|e| e.run_id).max().map_or(1, |max| max + 1)
    }

    /// When the source was last attempted, or `None` if it never was.
    pub fn last_run(&self, source_id: i64) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .filter(|e| e.source_id == source_id)
            .map(|e| e.run_timestamp)
            .max()
    }

    /// Cutoff for "new" items: strictly newer than this is new.
    pub fn watermark(&self, source_id: i64) -> DateTime<Utc> {
        self.last_run(source_id).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn append(&mut self, entry: RunLogEntry) {
        self.entries.push(entry);
    }

    /// Look up the source a batch (run_id) came from.
    pub fn source_for_run(&self, run_id: u64) -> Option<i64> {
        self.entries.iter().find(|e| e.run_id == run_id).map(|e| e.source_id)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Exclusive claim on a run log for one invocation. Held across load, run_id
/// allocation, append and save; released (file removed) on drop.
#[derive(Debug)]
pub struct RunLogLock {
    path: PathBuf,
}

impl RunLogLock {
    pub fn acquire(log_path: &Path) -> Result<Self> {
        let path = sibling(log_path, "lock");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // The pid is only a hint for whoever finds a stale lock.
                if let Err(e) = writeln!(file, "{}", std::process::id()) {
                    tracing::warn!(path = %path.display(), error = %e, "could not record pid in lock file");
                }
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path).unwrap_or_default();
                anyhow::bail!(
                    "run log {} is locked by another invocation (pid {}); remove {} if it is stale",
                    log_path.display(),
                    holder.trim(),
                    path.display()
                )
            }
            Err(e) => Err(e).with_context(|| format!("Failed to create lock {}", path.display())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLogLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release run log lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn entry(run_id: u64, source_id: i64, run_timestamp: DateTime<Utc>) -> RunLogEntry {
        RunLogEntry {
            run_id,
            source_id,
            run_timestamp,
            http_status: 200,
            item_count: 0,
        }
    }

    #[test]
    fn test_empty_log() {
        let log = RunLog::new();
        assert_eq!(log.next_run_id(), 1);
        assert_eq!(log.watermark(1), DateTime::<Utc>::MIN_UTC);
        assert_eq!(log.last_run(1), None);
    }

    #[test]
    fn test_next_run_id_uses_all_time_max() {
        let log = RunLog::from_entries(vec![entry(7, 1, ts(2024, 1, 1)), entry(3, 2, ts(2024, 1, 2))]);
        assert_eq!(log.next_run_id(), 8);
    }

    #[test]
    fn test_watermark_is_per_source_max_run_timestamp() {
        let log = RunLog::from_entries(vec![
            entry(1, 1, ts(2024, 1, 3)),
            entry(2, 2, ts(2024, 5, 1)),
            entry(3, 1, ts(2024, 1, 5)),
            entry(4, 1, ts(2024, 1, 4)),
        ]);
        assert_eq!(log.watermark(1), ts(2024, 1, 5));
        assert_eq!(log.watermark(2), ts(2024, 5, 1));
        assert_eq!(log.watermark(3), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_failed_and_empty_rows_count_toward_watermark() {
        let log = RunLog::from_entries(vec![
            RunLogEntry { item_count: 3, ..entry(1, 1, ts(2024, 1, 3)) },
            RunLogEntry { http_status: 500, ..entry(2, 1, ts(2024, 6, 1)) },
            entry(3, 2, ts(2024, 6, 1)),
        ]);
        assert_eq!(log.watermark(1), ts(2024, 6, 1));
        assert_eq!(log.watermark(2), ts(2024, 6, 1));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("feed_logs.csv");
        let log = RunLog::from_entries(vec![
            RunLogEntry { item_count: 3, ..entry(1, 1, ts(2024, 6, 1)) },
            RunLogEntry { http_status: 500, ..entry(2, 2, ts(2024, 6, 1)) },
        ]);
        log.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "run_id,rss_url_id,date,response,item_count\n\
             1,1,2024-06-01 00:00:00,200,3\n\
             2,2,2024-06-01 00:00:00,500,0\n"
        );
        assert!(!path.with_file_name("feed_logs.csv.tmp").exists());

        let loaded = RunLog::load(&path).unwrap();
        assert_eq!(loaded, log);
    }

    #[test]
    fn test_load_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed_logs.csv");
        fs::write(
            &path,
            "run_id,rss_url_id,date,response,item_count\n1,1,2024-05-01 10:00:00,200,2\n2,1,2024-05-02 10:00:00,404,0\n",
        )
        .unwrap();

        let log = RunLog::load(&path).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[1].http_status, 404);
        assert_eq!(log.watermark(1), Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap());
        assert_eq!(log.next_run_id(), 3);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::load(&dir.path().join("nope.csv")).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_bad_date_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed_logs.csv");
        fs::write(&path, "run_id,rss_url_id,date,response,item_count\n1,1,yesterday,200,2\n").unwrap();
        assert!(RunLog::load(&path).is_err());
    }

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed_logs.csv");

        let lock = RunLogLock::acquire(&path).unwrap();
        assert!(lock.path().exists());
        let holder = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(holder.trim(), std::process::id().to_string());
        let err = RunLogLock::acquire(&path).unwrap_err();
        assert!(err.to_string().contains("locked"));

        let lock_path = lock.path().to_path_buf();
        drop(lock);
        assert!(!lock_path.exists());
        assert!(RunLogLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_source_for_run() {
        let log = RunLog::from_entries(vec![entry(4, 9, ts(2024, 1, 1))]);
        assert_eq!(log.source_for_run(4), Some(9));
        assert_eq!(log.source_for_run(5), None);
    }
}
