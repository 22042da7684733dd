// src/refresh.rs
//! Admission control for manual refreshes: daily time-of-day windows,
//! plus an append-only log of past attempts with rolling retention.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 30;

/// A daily admission band: a time of day plus a symmetric tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshWindow {
    pub at: NaiveTime,
    pub tolerance_minutes: i64,
}

impl RefreshWindow {
    pub fn new(at: NaiveTime, tolerance_minutes: i64) -> Self {
        Self {
            at,
            tolerance_minutes,
        }
    }

    /// Whether `t` falls inside the band. The band may wrap midnight.
    fn contains(&self, t: NaiveTime) -> bool {
        let tol = Duration::minutes(self.tolerance_minutes);
        let (start, _) = self.at.overflowing_sub_signed(tol);
        let (end, _) = self.at.overflowing_add_signed(tol);
        if start <= end {
            start <= t && t <= end
        } else {
            t >= start || t <= end
        }
    }
}

/// Morning and evening, ± 30 minutes.
pub fn default_windows() -> Vec<RefreshWindow> {
    vec![
        RefreshWindow::new(NaiveTime::from_hms_opt(8, 0, 0).unwrap(), DEFAULT_TOLERANCE_MINUTES),
        RefreshWindow::new(NaiveTime::from_hms_opt(20, 0, 0).unwrap(), DEFAULT_TOLERANCE_MINUTES),
    ]
}

/// One refresh attempt, as persisted in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshAttempt {
    pub timestamp: DateTime<Local>,
    pub auto: bool,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshDecision {
    Admitted,
    Rejected {
        reason: String,
        next_eligible: DateTime<Local>,
    },
}

impl RefreshDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RefreshDecision::Admitted)
    }
}

/// Decides whether a manual refresh is currently permitted and owns the
/// attempt log. All operations take the clock reading explicitly so
/// callers (and tests) control time.
#[derive(Debug, Clone)]
pub struct RefreshManager {
    log_path: PathBuf,
    windows: Vec<RefreshWindow>,
    retention: Duration,
}

impl RefreshManager {
    /// An empty window list falls back to the single default morning
    /// window; a manager with no windows would never admit anything and
    /// the scheduler would have nothing to aim at.
    pub fn new(log_path: impl Into<PathBuf>, windows: Vec<RefreshWindow>, retention_days: i64) -> Self {
        let mut windows = if windows.is_empty() {
            tracing::warn!("no refresh windows configured, falling back to the default morning window");
            vec![default_windows().remove(0)]
        } else {
            windows
        };
        windows.sort_by_key(|w| w.at);
        Self {
            log_path: log_path.into(),
            windows,
            retention: Duration::days(retention_days),
        }
    }

    pub fn with_defaults(log_path: impl Into<PathBuf>) -> Self {
        Self::new(log_path, default_windows(), DEFAULT_RETENTION_DAYS)
    }

    pub fn windows(&self) -> &[RefreshWindow] {
        &self.windows
    }

    /// Is a manual refresh permitted at `at`? A rejection carries a
    /// human-readable reason naming the next eligible instant.
    pub fn check(&self, at: DateTime<Local>) -> RefreshDecision {
        let t = at.time();
        if self.windows.iter().any(|w| w.contains(t)) {
            return RefreshDecision::Admitted;
        }

        let next_eligible = self.next_eligible(at);
        let hours_until = (next_eligible - at).num_minutes() as f64 / 60.0;

        let mut reason = String::from("Manual refresh is only allowed during scheduled times:\n");
        for w in &self.windows {
            reason.push_str(&format!("• {}\n", w.at.format("%H:%M")));
        }
        reason.push_str(&format!(
            "\nNext scheduled refresh: {} ({:.1} hours from now)",
            next_eligible.format("%H:%M"),
            hours_until
        ));

        RefreshDecision::Rejected {
            reason,
            next_eligible,
        }
    }

    /// Earliest window start strictly later than `after`'s time of day,
    /// today; or the first window tomorrow when none remain.
    pub fn next_eligible(&self, after: DateTime<Local>) -> DateTime<Local> {
        let t = after.time();
        for w in &self.windows {
            if t < w.at {
                return at_time_of_day(after, w.at);
            }
        }
        at_time_of_day(after + Duration::days(1), self.windows[0].at)
    }

    /// Append an attempt, pruning entries older than the retention
    /// horizon relative to the attempt's own timestamp (deterministic
    /// regardless of when the pruning runs).
    pub fn record(&self, attempt: &RefreshAttempt) -> Result<()> {
        let cutoff = attempt.timestamp - self.retention;
        let mut log = self.load_log();
        log.retain(|e| e.timestamp > cutoff);
        log.push(attempt.clone());
        self.save_log(&log)
    }

    /// Attempts whose calendar date equals `at`'s.
    pub fn count_today(&self, at: DateTime<Local>) -> usize {
        let today = at.date_naive();
        self.load_log()
            .iter()
            .filter(|e| e.timestamp.date_naive() == today)
            .count()
    }

    /// The persisted log, oldest first. Missing or corrupt files read
    /// as empty.
    pub fn entries(&self) -> Vec<RefreshAttempt> {
        self.load_log()
    }

    fn load_log(&self) -> Vec<RefreshAttempt> {
        if !self.log_path.exists() {
            return Vec::new();
        }
        let content = match fs::read_to_string(&self.log_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.log_path.display(), "could not read refresh log");
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.log_path.display(), "refresh log is corrupt, starting empty");
                Vec::new()
            }
        }
    }

    fn save_log(&self, log: &[RefreshAttempt]) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(log).context("serializing refresh log")?;

        // Scoped write then rename, so an interrupted write cannot leave
        // a corrupt log behind.
        let tmp = self.log_path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.log_path)
            .with_context(|| format!("replacing {}", self.log_path.display()))
    }
}

/// `base` with its time of day replaced by `t` (seconds zeroed).
fn at_time_of_day(base: DateTime<Local>, t: NaiveTime) -> DateTime<Local> {
    base.with_hour(t.hour())
        .and_then(|d| d.with_minute(t.minute()))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(base)
}
