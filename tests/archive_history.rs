// tests/archive_history.rs
use chrono::{Local, TimeZone};
use editorial_engine::editorial::{EditorialArchive, EditorialRecord, SourceRef};

fn record_at(h: u32, m: u32, title: &str) -> EditorialRecord {
    EditorialRecord {
        title: title.to_string(),
        content: "Body text.".to_string(),
        generated_at: Local.with_ymd_and_hms(2026, 2, 14, h, m, 0).unwrap(),
        sources: vec![
            SourceRef {
                title: "First story".to_string(),
                url: "https://example.com/first".to_string(),
                source: "Feed A".to_string(),
            },
            SourceRef {
                title: "Second story".to_string(),
                url: "https://example.com/second".to_string(),
                source: "Feed B".to_string(),
            },
        ],
        article_count: 2,
    }
}

#[test]
fn store_then_load_roundtrips_title_and_sources() {
    let dir = tempfile::tempdir().unwrap();
    let archive = EditorialArchive::new(dir.path());

    let record = record_at(8, 5, "Morning Wrap");
    let key = archive.store(&record).unwrap();
    let content = archive.load(&key).unwrap();

    assert!(content.contains("Morning Wrap"));
    for s in &record.sources {
        assert!(content.contains(&s.title));
        assert!(content.contains(&s.url));
    }
}

#[test]
fn listing_is_newest_first_and_skips_corrupt_entries() {
    let dir = tempfile::tempdir().unwrap();
    let archive = EditorialArchive::new(dir.path());

    archive.store(&record_at(8, 5, "Morning Wrap")).unwrap();
    archive.store(&record_at(20, 10, "Evening Wrap")).unwrap();

    // A file whose name is not a timestamp key must not break listing.
    std::fs::write(dir.path().join("scratchpad.md"), "# not an editorial").unwrap();

    let entries = archive.list();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].title, "Evening Wrap");
    assert_eq!(entries[1].title, "Morning Wrap");
}

#[test]
fn same_minute_store_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let archive = EditorialArchive::new(dir.path());

    let k1 = archive.store(&record_at(8, 5, "First draft")).unwrap();
    let k2 = archive.store(&record_at(8, 5, "Second draft")).unwrap();
    assert_eq!(k1, k2);

    assert_eq!(archive.list().len(), 1);
    assert!(archive.load(&k2).unwrap().contains("Second draft"));
}
