// tests/engine_cycle.rs
use anyhow::anyhow;
use chrono::{Local, TimeZone};
use editorial_engine::editorial::EditorialArchive;
use editorial_engine::engine::{CycleKind, IngestEngine, ManualRefresh};
use editorial_engine::ingest::rss::RssFetcher;
use editorial_engine::ingest::types::{FeedFetcher, FeedSource};
use editorial_engine::refresh::{RefreshDecision, RefreshManager};
use editorial_engine::summarize::{GeneratedCopy, SimpleSummarizer, Summarizer, SummaryRequest};
use editorial_engine::tracker::DownloadTracker;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

struct FailingSummarizer;

#[async_trait::async_trait]
impl Summarizer for FailingSummarizer {
    async fn summarize(&self, _req: &SummaryRequest) -> anyhow::Result<GeneratedCopy> {
        Err(anyhow!("backend unavailable"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

struct StalledSummarizer;

#[async_trait::async_trait]
impl Summarizer for StalledSummarizer {
    async fn summarize(&self, _req: &SummaryRequest) -> anyhow::Result<GeneratedCopy> {
        std::future::pending().await
    }

    fn name(&self) -> &'static str {
        "stalled"
    }
}

/// Signals when a cycle reaches the summarizer and holds it there until
/// the test releases a permit.
struct GatedSummarizer {
    entered: Arc<Notify>,
    release: Arc<Semaphore>,
}

#[async_trait::async_trait]
impl Summarizer for GatedSummarizer {
    async fn summarize(&self, req: &SummaryRequest) -> anyhow::Result<GeneratedCopy> {
        self.entered.notify_one();
        let _permit = self.release.acquire().await?;
        SimpleSummarizer.summarize(req).await
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

fn fixture_fetchers() -> Vec<Box<dyn FeedFetcher>> {
    vec![
        Box::new(RssFetcher::from_fixture_str(
            FeedSource::new("https://example.com/hn"),
            include_str!("fixtures/hn_rss.xml"),
        )),
        Box::new(RssFetcher::from_fixture_str(
            FeedSource::new("https://example.com/verge"),
            include_str!("fixtures/verge_rss.xml"),
        )),
    ]
}

fn engine_in<S: Summarizer>(dir: &Path, summarizer: S) -> IngestEngine<S> {
    let tracker = DownloadTracker::new(dir.join("last_download.json"));
    // Seed the watermark behind the fixture dates so the batch survives
    // the incremental filter.
    tracker
        .record_download(Local.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap())
        .unwrap();

    IngestEngine::new(
        fixture_fetchers(),
        tracker,
        RefreshManager::with_defaults(dir.join("refresh_log.json")),
        EditorialArchive::new(dir.join("editorials")),
        summarizer,
    )
}

#[tokio::test]
async fn automatic_cycle_archives_and_advances_the_watermark() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path(), SimpleSummarizer);

    let outcome = engine.run_cycle(CycleKind::Automatic).await.unwrap();

    assert_eq!(outcome.articles.len(), 5);
    assert_eq!(outcome.editorial.article_count, 5);
    assert_eq!(engine.archive().list().len(), 1);

    let watermark = engine.tracker().last_download(false).expect("advanced");
    assert_eq!(watermark, outcome.fetched_at);

    let entries = engine.refresh().entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].auto);
}

#[tokio::test]
async fn summarizer_failure_still_archives_a_plain_digest() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path(), FailingSummarizer);

    let outcome = engine.run_cycle(CycleKind::Automatic).await.unwrap();

    assert_eq!(outcome.editorial.title, "Your Morning News");
    assert!(outcome.editorial.content.contains("Your Morning News Digest"));

    let content = engine.archive().load(&outcome.archive_key).unwrap();
    assert!(content.contains("Your Morning News Digest"));
}

#[tokio::test]
async fn manual_refresh_is_a_check_then_force_protocol() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path(), SimpleSummarizer);

    let afternoon = Local.with_ymd_and_hms(2026, 2, 14, 14, 0, 0).unwrap();
    match engine.check_manual(afternoon) {
        RefreshDecision::Rejected {
            reason,
            next_eligible,
        } => {
            assert!(reason.contains("20:00"), "reason was: {reason}");
            assert_eq!(
                next_eligible,
                Local.with_ymd_and_hms(2026, 2, 14, 20, 0, 0).unwrap()
            );
        }
        RefreshDecision::Admitted => panic!("14:00 must not be admitted"),
    }

    // The user confirmed the override: the cycle runs and is logged as
    // manual.
    match engine.force_refresh().await.unwrap() {
        ManualRefresh::Completed(outcome) => {
            assert_eq!(outcome.articles.len(), 5);
        }
        other => panic!("expected completion, got {other:?}"),
    }
    let entries = engine.refresh().entries();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].auto);
}

#[tokio::test]
async fn cycle_dropped_mid_summarize_does_not_advance_the_watermark() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(engine_in(dir.path(), StalledSummarizer));
    let seeded = Local.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

    let running = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run_cycle(CycleKind::Automatic).await })
    };
    // Let the cycle reach the summarizer, then drop it the way the
    // scheduler's shutdown race does.
    tokio::time::sleep(Duration::from_millis(50)).await;
    running.abort();
    let _ = running.await;

    assert_eq!(engine.tracker().last_download(false), Some(seeded));
    assert!(engine.archive().list().is_empty());
    assert!(engine.refresh().entries().is_empty());
}

#[tokio::test]
async fn concurrent_force_refresh_reports_busy() {
    let dir = tempfile::tempdir().unwrap();
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Semaphore::new(0));
    let engine = Arc::new(engine_in(
        dir.path(),
        GatedSummarizer {
            entered: entered.clone(),
            release: release.clone(),
        },
    ));

    let running = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run_cycle(CycleKind::Automatic).await })
    };
    entered.notified().await;

    match engine.force_refresh().await.unwrap() {
        ManualRefresh::Busy => {}
        other => panic!("expected busy, got {other:?}"),
    }

    release.add_permits(1);
    let outcome = running.await.unwrap().unwrap();
    assert_eq!(outcome.articles.len(), 5);

    // Once the lock is free the manual path runs.
    match engine.force_refresh().await.unwrap() {
        ManualRefresh::Completed(_) => {}
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn editorial_records_every_source_reference() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path(), SimpleSummarizer);

    let outcome = engine.run_cycle(CycleKind::Manual).await.unwrap();
    let content = engine.archive().load(&outcome.archive_key).unwrap();

    for article in &outcome.articles {
        assert!(content.contains(&article.title));
    }
}
