// src/opml.rs
//! OPML-backed feed list: the subscriptions a user manages outlive any
//! one config file, so they live in their own document.

use anyhow::{Context, Result};
use quick_xml::{de::from_str, se::to_string};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::FeedSource;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "opml")]
struct OpmlDoc {
    #[serde(rename = "@version")]
    version: String,
    head: Head,
    body: Body,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Head {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Body {
    #[serde(rename = "outline", default)]
    outline: Vec<Outline>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Outline {
    #[serde(rename = "@text")]
    text: String,
    #[serde(rename = "@title", skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(rename = "@xmlUrl")]
    xml_url: String,
}

impl OpmlDoc {
    fn empty() -> Self {
        Self {
            version: "2.0".to_string(),
            head: Head {
                title: Some("Feed subscriptions".to_string()),
            },
            body: Body::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpmlManager {
    path: PathBuf,
}

impl OpmlManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribed feeds, in document order. A missing file is an empty
    /// list; a corrupt one is logged and also reads as empty.
    pub fn list_feeds(&self) -> Vec<FeedSource> {
        self.load()
            .body
            .outline
            .into_iter()
            .map(|o| FeedSource {
                url: o.xml_url,
                title: o.title.or(Some(o.text)).filter(|t| !t.is_empty()),
            })
            .collect()
    }

    /// Add a feed. Returns false (and writes nothing) when the URL is
    /// already subscribed.
    pub fn add_feed(&self, url: &str, title: Option<&str>) -> Result<bool> {
        let mut doc = self.load();
        if doc.body.outline.iter().any(|o| o.xml_url == url) {
            return Ok(false);
        }
        doc.body.outline.push(Outline {
            text: title.unwrap_or(url).to_string(),
            title: title.map(str::to_string),
            kind: Some("rss".to_string()),
            xml_url: url.to_string(),
        });
        self.save(&doc)?;
        Ok(true)
    }

    /// Remove a feed by URL. Returns false when it was not subscribed.
    pub fn remove_feed(&self, url: &str) -> Result<bool> {
        let mut doc = self.load();
        let before = doc.body.outline.len();
        doc.body.outline.retain(|o| o.xml_url != url);
        if doc.body.outline.len() == before {
            return Ok(false);
        }
        self.save(&doc)?;
        Ok(true)
    }

    fn load(&self) -> OpmlDoc {
        if !self.path.exists() {
            return OpmlDoc::empty();
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.path.display(), "could not read opml file");
                return OpmlDoc::empty();
            }
        };
        match from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.path.display(), "opml file is corrupt, starting empty");
                OpmlDoc::empty()
            }
        }
    }

    fn save(&self, doc: &OpmlDoc) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let xml = to_string(doc).context("serializing opml")?;
        let content = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{xml}");
        fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_list_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = OpmlManager::new(dir.path().join("feeds.opml"));

        assert!(mgr.list_feeds().is_empty());
        assert!(mgr.add_feed("https://example.com/feed.xml", Some("Example")).unwrap());
        assert!(!mgr.add_feed("https://example.com/feed.xml", None).unwrap());

        let feeds = mgr.list_feeds();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].url, "https://example.com/feed.xml");
        assert_eq!(feeds[0].title.as_deref(), Some("Example"));

        assert!(mgr.remove_feed("https://example.com/feed.xml").unwrap());
        assert!(!mgr.remove_feed("https://example.com/feed.xml").unwrap());
        assert!(mgr.list_feeds().is_empty());
    }

    #[test]
    fn corrupt_document_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.opml");
        fs::write(&path, "<not really opml").unwrap();

        let mgr = OpmlManager::new(&path);
        assert!(mgr.list_feeds().is_empty());
    }
}
