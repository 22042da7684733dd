// src/engine.rs
//! Ingestion-cycle orchestration: collect → summarize → archive →
//! advance watermark → record attempt. Full cycles are serialized;
//! manual triggers go through the admission check first.

use anyhow::Result;
use chrono::{DateTime, Local};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;

use crate::editorial::{build_editorial, EditorialArchive, EditorialRecord};
use crate::ingest::types::{Article, FeedFetcher};
use crate::refresh::{RefreshAttempt, RefreshDecision, RefreshManager};
use crate::summarize::{PromptSet, Summarizer};
use crate::tracker::DownloadTracker;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("engine_cycles_total", "Completed ingestion cycles.");
        describe_counter!(
            "scheduler_runs_total",
            "Automatic refreshes triggered by the scheduler."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// Scheduler-triggered. Automatic cycles are the schedule, so they
    /// bypass the admission check.
    Automatic,
    /// User-triggered, subject to admission.
    Manual,
}

impl CycleKind {
    fn is_auto(self) -> bool {
        matches!(self, CycleKind::Automatic)
    }
}

/// Result of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub articles: Vec<Article>,
    pub fetched_at: DateTime<Local>,
    pub editorial: EditorialRecord,
    pub archive_key: String,
}

/// Events for the presentation collaborator.
#[derive(Debug, Clone)]
pub enum CycleUpdate {
    Articles {
        articles: Vec<Article>,
        fetched_at: DateTime<Local>,
    },
    Editorial {
        record: EditorialRecord,
        key: String,
    },
}

/// Outcome of a user-triggered refresh request.
#[derive(Debug, Clone)]
pub enum ManualRefresh {
    Completed(CycleOutcome),
    Rejected {
        reason: String,
        next_eligible: DateTime<Local>,
    },
    /// Another cycle holds the lock; try again once it finishes.
    Busy,
}

pub struct IngestEngine<S: Summarizer> {
    fetchers: Vec<Box<dyn FeedFetcher>>,
    tracker: DownloadTracker,
    refresh: RefreshManager,
    archive: EditorialArchive,
    summarizer: S,
    keywords: Vec<String>,
    prompts: Option<PromptSet>,
    updates: Option<UnboundedSender<CycleUpdate>>,
    cycle_lock: Mutex<()>,
}

impl<S: Summarizer> IngestEngine<S> {
    pub fn new(
        fetchers: Vec<Box<dyn FeedFetcher>>,
        tracker: DownloadTracker,
        refresh: RefreshManager,
        archive: EditorialArchive,
        summarizer: S,
    ) -> Self {
        Self {
            fetchers,
            tracker,
            refresh,
            archive,
            summarizer,
            keywords: Vec::new(),
            prompts: None,
            updates: None,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_prompts(mut self, prompts: Option<PromptSet>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Attach the channel cycle updates are published on.
    pub fn with_updates(mut self, updates: UnboundedSender<CycleUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn refresh(&self) -> &RefreshManager {
        &self.refresh
    }

    pub fn archive(&self) -> &EditorialArchive {
        &self.archive
    }

    pub fn tracker(&self) -> &DownloadTracker {
        &self.tracker
    }

    /// Run one full ingestion cycle, waiting for any in-flight cycle to
    /// finish first. This is the scheduler's entry point.
    pub async fn run_cycle(&self, kind: CycleKind) -> Result<CycleOutcome> {
        let _guard = self.cycle_lock.lock().await;
        self.run_cycle_locked(kind).await
    }

    /// Step one of the manual protocol: may a refresh run at `at`?
    pub fn check_manual(&self, at: DateTime<Local>) -> RefreshDecision {
        self.refresh.check(at)
    }

    /// Step two: run regardless of the admission decision (the caller
    /// has confirmed the override). Rejects instead of queueing when a
    /// cycle is already in flight.
    pub async fn force_refresh(&self) -> Result<ManualRefresh> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            return Ok(ManualRefresh::Busy);
        };
        let outcome = self.run_cycle_locked(CycleKind::Manual).await?;
        Ok(ManualRefresh::Completed(outcome))
    }

    /// The ordinary manual path: check, then run or report why not.
    pub async fn manual_refresh(&self) -> Result<ManualRefresh> {
        match self.check_manual(Local::now()) {
            RefreshDecision::Rejected {
                reason,
                next_eligible,
            } => Ok(ManualRefresh::Rejected {
                reason,
                next_eligible,
            }),
            RefreshDecision::Admitted => self.force_refresh().await,
        }
    }

    async fn run_cycle_locked(&self, kind: CycleKind) -> Result<CycleOutcome> {
        ensure_metrics_described();
        let since = self.tracker.last_download(true);
        let (articles, fetched_at) = crate::ingest::collect(&self.fetchers, since).await;
        tracing::info!(
            articles = articles.len(),
            since = ?since,
            auto = kind.is_auto(),
            "collection finished"
        );

        self.publish(CycleUpdate::Articles {
            articles: articles.clone(),
            fetched_at,
        });

        let editorial = build_editorial(
            &articles,
            &self.summarizer,
            &self.keywords,
            self.prompts.as_ref(),
            Local::now(),
        )
        .await;

        // The one write whose failure is the cycle's failure.
        let archive_key = self.archive.store(&editorial)?;

        // The watermark moves only once the batch is archived; a cycle
        // dropped at shutdown mid-summarize leaves it untouched and the
        // same window is refetched next time. Past this point the writes
        // are best-effort.
        if let Err(e) = self.tracker.record_download(fetched_at) {
            tracing::warn!(error = ?e, "could not advance watermark");
        }
        let attempt = RefreshAttempt {
            timestamp: fetched_at,
            auto: kind.is_auto(),
        };
        if let Err(e) = self.refresh.record(&attempt) {
            tracing::warn!(error = ?e, "could not record refresh attempt");
        }

        counter!("engine_cycles_total").increment(1);

        self.publish(CycleUpdate::Editorial {
            record: editorial.clone(),
            key: archive_key.clone(),
        });

        Ok(CycleOutcome {
            articles,
            fetched_at,
            editorial,
            archive_key,
        })
    }

    fn publish(&self, update: CycleUpdate) {
        if let Some(tx) = &self.updates {
            // A hung-up presentation side is not our problem.
            let _ = tx.send(update);
        }
    }
}
