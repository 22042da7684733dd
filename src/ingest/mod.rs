// src/ingest/mod.rs
pub mod rss;
pub mod types;

use crate::ingest::types::{Article, FeedFetcher};
use chrono::{DateTime, Local};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on whatever exporter
/// the embedding app wires).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_articles_total", "Articles parsed from feeds.");
        describe_counter!(
            "ingest_kept_total",
            "Articles kept after the watermark filter."
        );
        describe_counter!(
            "ingest_filtered_total",
            "Articles dropped as older than the watermark."
        );
        describe_counter!("ingest_feed_errors_total", "Feed fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_last_collect_ts",
            "Unix ts when collection last ran."
        );
    });
}

/// Normalize feed text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Length cap: 1500 chars of content is plenty for summarization
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Drop articles published strictly before `since`. Dateless articles
/// always pass; better a duplicate than a silent loss.
pub fn filter_since(articles: Vec<Article>, since: Option<DateTime<Local>>) -> (Vec<Article>, usize) {
    let Some(since) = since else {
        return (articles, 0);
    };
    let mut dropped = 0usize;
    let kept = articles
        .into_iter()
        .filter(|a| match a.published_at {
            Some(published) if published < since => {
                dropped += 1;
                false
            }
            _ => true,
        })
        .collect();
    (kept, dropped)
}

/// Collect from every fetcher once. One bad feed is logged and skipped;
/// it never aborts the rest of the batch. Returns the surviving articles
/// plus the instant the batch started (the new watermark candidate).
pub async fn collect(
    fetchers: &[Box<dyn FeedFetcher>],
    since: Option<DateTime<Local>>,
) -> (Vec<Article>, DateTime<Local>) {
    ensure_metrics_described();
    let batch_started = Local::now();

    let mut raw = Vec::new();
    for f in fetchers {
        match f.fetch_latest().await {
            Ok(mut v) => raw.append(&mut v),
            Err(e) => {
                tracing::warn!(error = ?e, feed = f.label(), "feed error");
                counter!("ingest_feed_errors_total").increment(1);
            }
        }
    }

    let (kept, dropped) = filter_since(raw, since);

    counter!("ingest_kept_total").increment(kept.len() as u64);
    counter!("ingest_filtered_total").increment(dropped as u64);
    gauge!("ingest_last_collect_ts").set(batch_started.timestamp().max(0) as f64);

    (kept, batch_started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(published_at: Option<DateTime<Local>>) -> Article {
        Article {
            title: "t".into(),
            link: String::new(),
            summary: "s".into(),
            published_at,
            source: "Test".into(),
        }
    }

    #[test]
    fn normalize_text_strips_tags_and_collapses_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b></p>  ";
        assert_eq!(normalize_text(s), "Hello, world");
    }

    #[test]
    fn watermark_filter_keeps_equal_newer_and_dateless() {
        let since = Local.with_ymd_and_hms(2026, 2, 12, 0, 0, 0).unwrap();
        let older = Local.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).unwrap();
        let newer = Local.with_ymd_and_hms(2026, 2, 13, 8, 0, 0).unwrap();

        let (kept, dropped) = filter_since(
            vec![
                article(Some(older)),
                article(Some(since)),
                article(Some(newer)),
                article(None),
            ],
            Some(since),
        );
        assert_eq!(kept.len(), 3);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn no_watermark_means_no_filter() {
        let (kept, dropped) = filter_since(vec![article(None)], None);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 0);
    }
}
