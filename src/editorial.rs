// src/editorial.rs
//! Editorial records and their archive: every successful cycle produces
//! one immutable markdown document, keyed by its generation minute and
//! browsable newest-first.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::Article;
use crate::summarize::{PromptSet, Summarizer, SummaryRequest};

const KEY_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// One article reference carried in the editorial's sources section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
    pub source: String,
}

/// A generated aggregate document. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorialRecord {
    pub title: String,
    pub content: String,
    pub generated_at: DateTime<Local>,
    pub sources: Vec<SourceRef>,
    pub article_count: usize,
}

/// Build an editorial from a collected batch. The summarizer may fail;
/// the record is still produced from the deterministic digest so the
/// archive always receives something usable.
pub async fn build_editorial(
    articles: &[Article],
    summarizer: &dyn Summarizer,
    keywords: &[String],
    prompts: Option<&PromptSet>,
    generated_at: DateTime<Local>,
) -> EditorialRecord {
    if articles.is_empty() {
        return EditorialRecord {
            title: "Good Morning!".to_string(),
            content: "No news articles available today.".to_string(),
            generated_at,
            sources: Vec::new(),
            article_count: 0,
        };
    }

    let request = SummaryRequest {
        text: article_digest(articles),
        keywords: keywords.to_vec(),
        prompts: prompts.cloned(),
        max_len: None,
    };

    let (title, content) = match summarizer.summarize(&request).await {
        Ok(copy) => (copy.title, copy.content),
        Err(e) => {
            tracing::warn!(error = ?e, backend = summarizer.name(), "summarizer failed, using plain digest");
            ("Your Morning News".to_string(), simple_editorial(articles))
        }
    };

    let sources = articles
        .iter()
        .map(|a| SourceRef {
            title: a.title.clone(),
            url: a.link.clone(),
            source: a.source.clone(),
        })
        .collect();

    EditorialRecord {
        title,
        content,
        generated_at,
        sources,
        article_count: articles.len(),
    }
}

/// The numbered story list handed to the summarizer.
fn article_digest(articles: &[Article]) -> String {
    let mut text = String::new();
    for (i, a) in articles.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, a.title));
        text.push_str(&format!("   Source: {}\n", a.source));
        text.push_str(&format!("   {}\n\n", a.summary));
    }
    text
}

/// Non-AI aggregate: title plus a truncated excerpt per story.
pub fn simple_editorial(articles: &[Article]) -> String {
    let mut content = String::from("## Your Morning News Digest\n\n");
    content.push_str(&format!(
        "Here are the top stories from {} articles:\n\n",
        articles.len()
    ));
    for (i, a) in articles.iter().take(5).enumerate() {
        let excerpt: String = a.summary.chars().take(150).collect();
        content.push_str(&format!("**{}. {}**\n{}\n\n", i + 1, a.title, excerpt));
    }
    content
}

/// Render a record to the archived markdown form.
pub fn render_markdown(record: &EditorialRecord) -> String {
    let date_str = record.generated_at.format("%A, %B %d, %Y at %H:%M");

    let mut md = format!("# {}\n\n", record.title);
    md.push_str(&format!("*{date_str}*\n\n"));
    md.push_str("---\n\n");
    md.push_str(&record.content);
    md.push_str("\n\n---\n\n");
    md.push_str("## Sources\n\n");

    for s in &record.sources {
        if s.url.is_empty() {
            md.push_str(&format!("- **{}** - *{}*\n\n", s.title, s.source));
        } else {
            md.push_str(&format!(
                "- **{}** - *{}*  \n  [{}]({})\n\n",
                s.title, s.source, s.url, s.url
            ));
        }
    }

    md.push_str(&format!(
        "\n*Editorial generated from {} articles*\n",
        record.article_count
    ));
    md
}

/// Listing entry: enough to render a history picker.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub title: String,
    pub timestamp: NaiveDateTime,
    pub key: String,
}

/// Directory of archived editorials. Append-only: storing under an
/// existing key (same minute) overwrites, nothing else ever rewrites a
/// stored document.
#[derive(Debug, Clone)]
pub struct EditorialArchive {
    dir: PathBuf,
}

impl EditorialArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize and persist the record; returns its key.
    pub fn store(&self, record: &EditorialRecord) -> Result<String> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let key = format!("{}.md", record.generated_at.format(KEY_FORMAT));
        let path = self.dir.join(&key);
        fs::write(&path, render_markdown(record))
            .with_context(|| format!("writing editorial {}", path.display()))?;
        Ok(key)
    }

    /// All archived editorials, newest first. Entries with unparseable
    /// keys or unreadable content are skipped with a warning.
    pub fn list(&self) -> Vec<ArchiveEntry> {
        let mut entries = Vec::new();

        let dir_iter = match fs::read_dir(&self.dir) {
            Ok(it) => it,
            Err(_) => return entries, // no archive yet
        };

        for entry in dir_iter.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("md") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let timestamp = match NaiveDateTime::parse_from_str(stem, KEY_FORMAT) {
                Ok(ts) => ts,
                Err(e) => {
                    tracing::warn!(error = ?e, path = %path.display(), "skipping archive entry with unparseable key");
                    continue;
                }
            };
            let title = match fs::read_to_string(&path) {
                Ok(content) => content
                    .lines()
                    .next()
                    .and_then(|l| l.strip_prefix("# "))
                    .unwrap_or("Untitled")
                    .to_string(),
                Err(e) => {
                    tracing::warn!(error = ?e, path = %path.display(), "skipping unreadable archive entry");
                    continue;
                }
            };

            entries.push(ArchiveEntry {
                title,
                timestamp,
                key: format!("{stem}.md"),
            });
        }

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    /// Full content of a stored editorial. A missing key surfaces as an
    /// error whose source is `std::io::Error` of kind NotFound.
    pub fn load(&self, key: &str) -> Result<String> {
        let path = self.dir.join(key);
        fs::read_to_string(&path)
            .with_context(|| format!("loading editorial {}", path.display()))
    }
}
