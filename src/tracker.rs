// src/tracker.rs
//! Persisted fetch watermark: the single "last successful download"
//! instant that incremental collection filters against.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize)]
struct TrackerFile {
    last_download: Option<String>,
}

/// Start of the previous calendar day, relative to `now`. The first-run
/// default: a fresh install ingests one day of backlog, not all of it.
pub fn start_of_prior_day(now: DateTime<Local>) -> DateTime<Local> {
    let yesterday = now - chrono::Duration::days(1);
    yesterday
        .with_hour(0)
        .and_then(|d| d.with_minute(0))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(yesterday)
}

/// File-backed watermark store. Single writer; reads degrade to the
/// documented default instead of failing.
#[derive(Debug, Clone)]
pub struct DownloadTracker {
    path: PathBuf,
}

impl DownloadTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The persisted watermark, if present and parseable. With
    /// `default_to_yesterday` an absent or corrupt record yields the
    /// start of the previous calendar day instead of None.
    pub fn last_download(&self, default_to_yesterday: bool) -> Option<DateTime<Local>> {
        match self.read_persisted() {
            Some(ts) => Some(ts),
            None if default_to_yesterday => Some(start_of_prior_day(Local::now())),
            None => None,
        }
    }

    /// Persist `at` as the new watermark. Never moves the watermark
    /// backwards: an older candidate from a stale caller is ignored.
    pub fn record_download(&self, at: DateTime<Local>) -> Result<()> {
        if let Some(current) = self.read_persisted() {
            if current >= at {
                tracing::debug!(%current, candidate = %at, "watermark already ahead, not rewinding");
                return Ok(());
            }
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let record = TrackerFile {
            last_download: Some(at.to_rfc3339()),
        };
        let json = serde_json::to_string_pretty(&record).context("serializing watermark")?;

        // Scoped write then rename, so concurrent readers never see a
        // partial record.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    fn read_persisted(&self) -> Option<DateTime<Local>> {
        if !self.path.exists() {
            return None;
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.path.display(), "could not read download tracker");
                return None;
            }
        };
        let record: TrackerFile = match serde_json::from_str(&content) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.path.display(), "download tracker is corrupt");
                return None;
            }
        };
        let raw = record.last_download?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(ts) => Some(ts.with_timezone(&Local)),
            Err(e) => {
                tracing::warn!(error = ?e, raw, "download tracker timestamp unparseable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prior_day_default_is_yesterday_midnight() {
        let now = Local.with_ymd_and_hms(2026, 2, 14, 10, 0, 0).unwrap();
        let d = start_of_prior_day(now);
        assert_eq!(d, Local.with_ymd_and_hms(2026, 2, 13, 0, 0, 0).unwrap());
    }

    #[test]
    fn empty_store_without_default_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = DownloadTracker::new(dir.path().join("last_download.json"));
        assert!(tracker.last_download(false).is_none());
    }

    #[test]
    fn roundtrip_and_monotonicity() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = DownloadTracker::new(dir.path().join("last_download.json"));

        let t1 = Local.with_ymd_and_hms(2026, 2, 13, 8, 0, 0).unwrap();
        let t2 = Local.with_ymd_and_hms(2026, 2, 14, 8, 0, 0).unwrap();

        tracker.record_download(t2).unwrap();
        // stale caller re-applies an earlier instant
        tracker.record_download(t1).unwrap();

        assert_eq!(tracker.last_download(false), Some(t2));
    }

    #[test]
    fn corrupt_file_degrades_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_download.json");
        fs::write(&path, "not json at all").unwrap();

        let tracker = DownloadTracker::new(&path);
        assert!(tracker.last_download(false).is_none());
        let d = tracker.last_download(true).unwrap();
        assert_eq!((d.hour(), d.minute(), d.second()), (0, 0, 0));
    }
}
