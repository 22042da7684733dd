// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod editorial;
pub mod engine;
pub mod ingest;
pub mod opml;
pub mod refresh;
pub mod scheduler;
pub mod summarize;
pub mod tracker;

// ---- Re-exports for stable public API ----
pub use crate::editorial::{ArchiveEntry, EditorialArchive, EditorialRecord, SourceRef};
pub use crate::engine::{CycleKind, CycleOutcome, CycleUpdate, IngestEngine, ManualRefresh};
pub use crate::ingest::types::{Article, FeedFetcher, FeedSource};
pub use crate::refresh::{RefreshAttempt, RefreshDecision, RefreshManager, RefreshWindow};
pub use crate::summarize::{GeneratedCopy, Summarizer, SummarizerBackend};
pub use crate::tracker::DownloadTracker;
