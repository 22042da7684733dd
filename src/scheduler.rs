// src/scheduler.rs
//! The always-running refresh loop: sleep until the next admission
//! window opens, run an automatic cycle, cool down, repeat.

use crate::engine::{CycleKind, IngestEngine};
use crate::summarize::Summarizer;
use chrono::Local;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    /// Pause after each cycle so a window boundary cannot double-fire.
    pub cooldown_secs: u64,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self { cooldown_secs: 60 }
    }
}

/// Spawn the scheduler loop. Sleeps are raced against `shutdown`; a
/// cycle interrupted by shutdown is dropped before it can advance the
/// watermark.
pub fn spawn_refresh_scheduler<S>(
    engine: Arc<IngestEngine<S>>,
    cfg: SchedulerCfg,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: Summarizer + 'static,
{
    tokio::spawn(async move {
        loop {
            let now = Local::now();
            let next = engine.refresh().next_eligible(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::info!(
                target: "scheduler",
                next = %next.format("%Y-%m-%d %H:%M"),
                "sleeping until next scheduled refresh"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                res = engine.run_cycle(CycleKind::Automatic) => {
                    counter!("scheduler_runs_total").increment(1);
                    match res {
                        Ok(outcome) => tracing::info!(
                            target: "scheduler",
                            articles = outcome.articles.len(),
                            key = %outcome.archive_key,
                            "automatic refresh complete"
                        ),
                        Err(e) => tracing::warn!(
                            target: "scheduler",
                            error = ?e,
                            "automatic refresh failed"
                        ),
                    }
                }
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(cfg.cooldown_secs)) => {}
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!(target: "scheduler", "scheduler loop stopped");
    })
}
