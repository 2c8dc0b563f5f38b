mod common;

use eventdb::Event;

#[tokio::test]
async fn search_ignores_case_and_diacritics() {
    let (_dir, store) = common::open_temp_store();

    store.capture(Event::new("Café Opened")).await;
    store.capture(Event::new("LOGIN")).await;
    store.capture(Event::new("login_failed")).await;

    let hits = store.search_events("CAFE").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_str(), "Café Opened");

    let hits = store.search_events("café").await;
    assert_eq!(hits.len(), 1);

    let hits = store.search_events("LOGIN").await;
    assert_eq!(hits.len(), 2, "matches both LOGIN and login_failed");

    store.shutdown().await;
}

#[tokio::test]
async fn search_returns_newest_first() {
    let (_dir, store) = common::open_temp_store();

    store.capture(Event::new("SIGNUP_STARTED")).await;
    store.capture(Event::new("SIGNUP_COMPLETED")).await;

    let hits = store.search_events("signup").await;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id.as_str(), "SIGNUP_COMPLETED");
    assert_eq!(hits[1].id.as_str(), "SIGNUP_STARTED");

    store.shutdown().await;
}

#[tokio::test]
async fn empty_query_matches_every_event() {
    let (_dir, store) = common::open_temp_store();

    for i in 0..4 {
        store.capture(Event::new(format!("E{i}"))).await;
    }

    assert_eq!(store.search_events("").await.len(), 4);

    store.shutdown().await;
}

#[tokio::test]
async fn no_match_returns_empty() {
    let (_dir, store) = common::open_temp_store();

    store.capture(Event::new("LOGIN")).await;

    assert!(store.search_events("purchase").await.is_empty());

    store.shutdown().await;
}

#[tokio::test]
async fn search_results_carry_parameters() {
    let (_dir, store) = common::open_temp_store();

    store.capture(Event::view_screen("Dashboard")).await;

    let hits = store.search_events("screen_view").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].parameters.len(), 1);
    assert_eq!(hits[0].parameters[0].key, "screen");

    store.shutdown().await;
}
