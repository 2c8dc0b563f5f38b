#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use eventdb::{EventStore, ParameterMap, ParameterValue};

static INIT_LOGGING: Once = Once::new();

/// Routes store and worker logs into the test harness (visible under
/// `--nocapture`), filtered by `RUST_LOG`.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn open_temp_store() -> (tempfile::TempDir, EventStore) {
    init_logging();
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let store = EventStore::open_in(dir.path()).expect("open event store");
    (dir, store)
}

pub fn open_temp_store_at(name: &str) -> (tempfile::TempDir, PathBuf, EventStore) {
    init_logging();
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let path = dir.path().join(name);
    let store = EventStore::open(&path).expect("open event store");
    (dir, path, store)
}

pub fn login_params(method: &str) -> ParameterMap {
    [("method".to_string(), ParameterValue::string(method))].into()
}

/// Round-trips the worker queue so the synchronous accessors observe every
/// earlier capture.
pub async fn drain(store: &EventStore) {
    let _ = store.fetch_next_page(0, 1).await;
}
