// tests/ingest_filtering.rs
use chrono::{Local, TimeZone};
use editorial_engine::ingest::rss::RssFetcher;
use editorial_engine::ingest::types::{FeedFetcher, FeedSource};
use editorial_engine::ingest::collect;

fn fixture(name: &str, xml: &str) -> Box<dyn FeedFetcher> {
    Box::new(RssFetcher::from_fixture_str(
        FeedSource::new(format!("https://example.com/{name}")),
        xml,
    ))
}

#[tokio::test]
async fn watermark_filter_drops_only_older_dated_items() {
    let fetchers = vec![fixture("hn", include_str!("fixtures/hn_rss.xml"))];
    let since = Local.with_ymd_and_hms(2026, 2, 12, 0, 0, 0).unwrap();

    let (articles, _fetched_at) = collect(&fetchers, Some(since)).await;

    let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
    // 2026-02-13 item stays, the dateless item stays, 2026-02-10 goes.
    assert_eq!(articles.len(), 2);
    assert!(titles.contains(&"Why our build got 10x faster"));
    assert!(titles.contains(&"Undated musings on software"));
}

#[tokio::test]
async fn one_broken_feed_does_not_abort_the_batch() {
    let fetchers = vec![
        fixture("hn", include_str!("fixtures/hn_rss.xml")),
        fixture("broken", include_str!("fixtures/broken_rss.xml")),
        fixture("verge", include_str!("fixtures/verge_rss.xml")),
    ];

    let (articles, _) = collect(&fetchers, None).await;

    // 3 from hn + 2 from verge; the broken feed contributes nothing but
    // kills nothing either.
    assert_eq!(articles.len(), 5);
    assert!(articles.iter().any(|a| a.source == "Hacker News Front Page"));
    assert!(articles.iter().any(|a| a.source == "The Verge - Tech"));
}

#[tokio::test]
async fn missing_fields_get_placeholders_and_channel_title_wins() {
    let fetchers = vec![fixture("verge", include_str!("fixtures/verge_rss.xml"))];

    let (articles, _) = collect(&fetchers, None).await;

    let untitled = articles
        .iter()
        .find(|a| a.link == "https://example.com/untitled")
        .expect("untitled item present");
    assert_eq!(untitled.title, "No Title");
    assert_eq!(untitled.summary, "No summary available.");
    assert_eq!(untitled.source, "The Verge - Tech");
}

#[tokio::test]
async fn html_in_descriptions_is_normalized() {
    let fetchers = vec![fixture("hn", include_str!("fixtures/hn_rss.xml"))];

    let (articles, _) = collect(&fetchers, None).await;

    let build_story = articles
        .iter()
        .find(|a| a.title == "Why our build got 10x faster")
        .expect("build story present");
    assert_eq!(
        build_story.summary,
        "A deep dive into caching and linker tricks."
    );
}
