mod common;

use eventdb::{Event, ParameterValue};

#[tokio::test]
async fn delete_removes_record_and_its_parameters_only() {
    let (_dir, store) = common::open_temp_store();

    store
        .capture(Event::new("KEEP").with_parameter("k", ParameterValue::string("v")))
        .await;
    store
        .capture(Event::new("DROP").with_parameter("k", ParameterValue::string("v")))
        .await;

    let page = store.fetch_next_page(0, 10).await;
    assert_eq!(page.len(), 2);
    let doomed = page
        .iter()
        .find(|r| r.id.as_str() == "DROP")
        .expect("record present");

    store.delete_event(doomed).await.expect("delete commits");
    common::drain(&store).await;

    assert_eq!(store.entities_count(), 1);
    assert!(!store.contains_event("DROP", None));

    let survivor = &store.fetch_next_page(0, 10).await[0];
    assert_eq!(survivor.id.as_str(), "KEEP");
    assert_eq!(survivor.parameters.len(), 1, "other records untouched");

    store.shutdown().await;
}

#[tokio::test]
async fn deleting_twice_is_ok() {
    let (_dir, store) = common::open_temp_store();

    store.capture(Event::new("ONCE")).await;
    let page = store.fetch_next_page(0, 1).await;

    store.delete_event(&page[0]).await.expect("first delete");
    store.delete_event(&page[0]).await.expect("second delete is a no-op");

    common::drain(&store).await;
    assert_eq!(store.entities_count(), 0);

    store.shutdown().await;
}

#[tokio::test]
async fn clean_empties_the_store() {
    let (_dir, store) = common::open_temp_store();

    for i in 0..10 {
        store
            .capture(Event::new(format!("E{i}")).with_parameter("n", ParameterValue::Integer(i)))
            .await;
    }

    store.clean().await.expect("clean commits");
    common::drain(&store).await;

    assert_eq!(store.entities_count(), 0);
    assert!(store.fetch_next_page(0, 10).await.is_empty());
    assert!(store.search_events("").await.is_empty());

    store.shutdown().await;
}

#[tokio::test]
async fn clean_on_empty_store_is_ok() {
    let (_dir, store) = common::open_temp_store();

    store.clean().await.expect("nothing to delete");
    assert_eq!(store.entities_count(), 0);

    store.shutdown().await;
}

#[tokio::test]
async fn capture_after_clean_starts_fresh() {
    let (_dir, store) = common::open_temp_store();

    store.capture(Event::new("OLD")).await;
    store.clean().await.expect("clean commits");
    store.capture(Event::new("NEW")).await;

    let page = store.fetch_next_page(0, 10).await;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id.as_str(), "NEW");

    store.shutdown().await;
}
