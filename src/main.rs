//! Editorial Engine — Binary Entrypoint
//! Wires the collector, admission control, summarizer, and archive into
//! the scheduler loop and runs it until ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use editorial_engine::config;
use editorial_engine::editorial::EditorialArchive;
use editorial_engine::engine::{CycleUpdate, IngestEngine};
use editorial_engine::ingest::rss::RssFetcher;
use editorial_engine::ingest::types::FeedFetcher;
use editorial_engine::opml::OpmlManager;
use editorial_engine::refresh::RefreshManager;
use editorial_engine::scheduler::{spawn_refresh_scheduler, SchedulerCfg};
use editorial_engine::tracker::DownloadTracker;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("editorial_engine=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env in dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_config_default().context("loading configuration")?;
    let data_dir = cfg.data_dir();

    // OPML subscriptions win over config feeds, which win over the
    // built-in defaults.
    let opml = OpmlManager::new(data_dir.join("feeds.opml"));
    let mut sources = opml.list_feeds();
    if sources.is_empty() {
        sources = cfg.feed_sources();
    }
    tracing::info!(feeds = sources.len(), data_dir = %data_dir.display(), "starting up");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("editorial-engine/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;
    let fetchers: Vec<Box<dyn FeedFetcher>> = sources
        .into_iter()
        .map(|s| Box::new(RssFetcher::from_source(s, client.clone())) as Box<dyn FeedFetcher>)
        .collect();

    let summarizer = config::build_summarizer(&cfg);
    let tracker = DownloadTracker::new(data_dir.join("last_download.json"));
    let refresh = RefreshManager::new(
        data_dir.join("refresh_log.json"),
        cfg.windows(),
        cfg.refresh.retention_days,
    );
    let archive = EditorialArchive::new(data_dir.join("editorials"));

    let (update_tx, mut update_rx) = tokio::sync::mpsc::unbounded_channel();
    let engine = Arc::new(
        IngestEngine::new(fetchers, tracker, refresh, archive, summarizer)
            .with_keywords(cfg.keywords.clone())
            .with_prompts(cfg.prompts.clone())
            .with_updates(update_tx),
    );

    // Stand-in for the presentation collaborator: log what a UI would
    // render.
    tokio::spawn(async move {
        while let Some(update) = update_rx.recv().await {
            match update {
                CycleUpdate::Articles {
                    articles,
                    fetched_at,
                } => tracing::info!(
                    articles = articles.len(),
                    fetched_at = %fetched_at.format("%Y-%m-%d %H:%M:%S"),
                    "new batch collected"
                ),
                CycleUpdate::Editorial { record, key } => tracing::info!(
                    title = %record.title,
                    key = %key,
                    "editorial archived"
                ),
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler = spawn_refresh_scheduler(
        engine,
        SchedulerCfg {
            cooldown_secs: cfg.refresh.cooldown_secs,
        },
        shutdown_rx,
    );

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    let _ = scheduler.await;

    Ok(())
}
