// src/ingest/rss.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::ingest::types::{Article, FeedFetcher, FeedSource};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    summary: Option<String>,
}

const TITLE_PLACEHOLDER: &str = "No Title";
const SUMMARY_PLACEHOLDER: &str = "No summary available.";

/// Parse a feed date. Two strategies: the RFC 2822 form RSS mandates for
/// `pubDate`, then RFC 3339 for feeds that emit it anyway. Anything else
/// yields None and the article stays dateless.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim();
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc2822) {
        let secs = dt.to_offset(UtcOffset::UTC).unix_timestamp();
        return DateTime::from_timestamp(secs, 0).map(|d| d.with_timezone(&Local));
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Local))
}

/// RSS feed fetcher. Fixture mode feeds tests and demos from a string;
/// HTTP mode pulls the document over reqwest.
pub struct RssFetcher {
    source: FeedSource,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

impl RssFetcher {
    pub fn from_fixture_str(source: FeedSource, xml: &str) -> Self {
        Self {
            source,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_source(source: FeedSource, client: reqwest::Client) -> Self {
        Self {
            source,
            mode: Mode::Http { client },
        }
    }

    fn parse_articles_from_str(&self, s: &str) -> Result<Vec<Article>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml from {}", self.source.url))?;

        // Channel title wins over the configured label; the URL is the
        // label of last resort.
        let source_label = rss
            .channel
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.label().to_string());

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = match it.title.as_deref().map(str::trim) {
                Some(t) if !t.is_empty() => crate::ingest::normalize_text(t),
                _ => TITLE_PLACEHOLDER.to_string(),
            };
            let summary = match it.description.as_deref().or(it.summary.as_deref()) {
                Some(d) if !d.trim().is_empty() => crate::ingest::normalize_text(d),
                _ => SUMMARY_PLACEHOLDER.to_string(),
            };

            out.push(Article {
                title,
                link: it.link.unwrap_or_default(),
                summary,
                published_at: it.pub_date.as_deref().and_then(parse_pub_date),
                source: source_label.clone(),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_articles_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait::async_trait]
impl FeedFetcher for RssFetcher {
    async fn fetch_latest(&self) -> Result<Vec<Article>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_articles_from_str(s),
            Mode::Http { client } => {
                let body = match client.get(&self.source.url).send().await {
                    Ok(resp) => resp
                        .text()
                        .await
                        .with_context(|| format!("reading body from {}", self.source.url))?,
                    Err(e) => {
                        tracing::warn!(error = ?e, feed = %self.source.url, "feed http error");
                        counter!("ingest_feed_errors_total").increment(1);
                        return Err(e)
                            .with_context(|| format!("fetching feed {}", self.source.url));
                    }
                };
                self.parse_articles_from_str(&body)
            }
        }
    }

    fn label(&self) -> &str {
        self.source.title.as_deref().unwrap_or(&self.source.url)
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
