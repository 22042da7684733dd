// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Local};

/// One normalized unit of feed content.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub summary: String,
    /// None when the feed gave no date, or gave one we could not parse.
    pub published_at: Option<DateTime<Local>>,
    pub source: String, // resolved channel title, or the feed URL
}

/// A configured feed endpoint. `title` is a fallback label; the channel
/// title from the fetched content wins when present.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub url: String,
    pub title: Option<String>,
}

impl FeedSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: Some(title.into()),
        }
    }
}

#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Article>>;
    fn label(&self) -> &str;
}
