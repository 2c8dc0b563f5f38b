mod common;

use std::collections::HashSet;

use eventdb::Event;

const PAGE_SIZE: u64 = 13;

#[tokio::test]
async fn pages_are_gapless_and_duplicate_free() {
    let (_dir, store) = common::open_temp_store();

    for i in 0..25 {
        store.capture(Event::new(format!("EVENT_{i:02}"))).await;
    }

    let page1 = store.fetch_next_page(0, PAGE_SIZE).await;
    let page2 = store.fetch_next_page(PAGE_SIZE, PAGE_SIZE).await;
    let page3 = store.fetch_next_page(2 * PAGE_SIZE, PAGE_SIZE).await;

    assert_eq!(page1.len(), 13);
    assert_eq!(page2.len(), 12);
    assert!(page3.is_empty());

    let all: Vec<_> = page1.iter().chain(&page2).collect();
    let distinct: HashSet<_> = all.iter().map(|r| r.record_id).collect();
    assert_eq!(distinct.len(), 25, "no record appears twice");

    // Newest first, oldest last.
    assert_eq!(all[0].id.as_str(), "EVENT_24");
    assert_eq!(all[24].id.as_str(), "EVENT_00");
    for window in all.windows(2) {
        assert!(window[0].created_at >= window[1].created_at);
    }

    store.shutdown().await;
}

#[tokio::test]
async fn offset_past_end_yields_empty_page() {
    let (_dir, store) = common::open_temp_store();

    store.capture(Event::new("ONLY")).await;

    assert!(store.fetch_next_page(1, PAGE_SIZE).await.is_empty());
    assert!(store.fetch_next_page(500, PAGE_SIZE).await.is_empty());

    store.shutdown().await;
}

#[tokio::test]
async fn empty_store_first_page_is_empty() {
    let (_dir, store) = common::open_temp_store();

    assert!(store.fetch_next_page(0, PAGE_SIZE).await.is_empty());
    assert_eq!(store.entities_count(), 0);

    store.shutdown().await;
}

/// Events captured in one burst can share a millisecond timestamp; row
/// identity must keep the pages disjoint anyway.
#[tokio::test]
async fn identical_timestamps_do_not_break_pagination() {
    let (_dir, store) = common::open_temp_store();

    for i in 0..40 {
        store.capture(Event::new(format!("BURST_{i}"))).await;
    }

    let mut seen = HashSet::new();
    let mut offset = 0;
    loop {
        let page = store.fetch_next_page(offset, PAGE_SIZE).await;
        if page.is_empty() {
            break;
        }
        for record in &page {
            assert!(seen.insert(record.record_id), "duplicate across pages");
        }
        offset += PAGE_SIZE;
    }
    assert_eq!(seen.len(), 40);

    store.shutdown().await;
}
