//! # Public Event Store API
//!
//! [`EventStore`] is the crate's front door. It wires together the pieces the
//! lower modules provide:
//!
//! - a background worker (see [`crate::worker`]) that owns the single
//!   read-write connection and serializes every mutation and list read,
//! - a long-lived read-only connection for the synchronous accessors, safe to
//!   call from latency-sensitive code because it never waits on the queue.
//!
//! ## Two Consistency Lanes
//!
//! Operations routed through the worker observe every earlier request from
//! any handle. The synchronous accessors read a separate WAL snapshot and may
//! briefly trail the queue; they converge once the worker commits. Callers
//! that need read-your-write must go through the async lane.
//!
//! ## Error Posture
//!
//! Mirrors how telemetry wants to fail: quietly.
//!
//! | operation                | on failure                    |
//! |--------------------------|-------------------------------|
//! | `capture`                | logged, call site unaffected  |
//! | `search_events`          | logged, empty `Vec`           |
//! | `fetch_next_page`        | logged, empty `Vec`           |
//! | `entities_count`         | logged, `0`                   |
//! | `contains_event`         | logged, `false`               |
//! | `last_date_of_event`     | logged, `None`                |
//! | `delete_event` / `clean` | `Err` returned to the caller  |

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::error::Result;
use crate::predicate::Predicate;
use crate::schema::Database;
use crate::storage;
use crate::types::{Event, EventRecord, ParameterMap};
use crate::worker::{self, WorkerHandle};

/// Default file name for a store created via [`EventStore::open_in`].
pub const DB_FILE_NAME: &str = "eventdb.sqlite";

/// A persistent, append-mostly store for telemetry events.
///
/// Cheap to clone; all clones share the same worker queue and read
/// connection.
#[derive(Clone)]
pub struct EventStore {
    worker: WorkerHandle,
    read_conn: Arc<Mutex<Connection>>,
    worker_thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl EventStore {
    /// Opens (creating if necessary) the store at `path`.
    ///
    /// Runs pending schema migrations, spawns the background worker, and
    /// opens the read-only connection for the synchronous accessors.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or migrated, including when it was
    /// written by a newer build of this crate.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let db = Database::open(path)?;
        let (worker, worker_thread) = worker::spawn_worker(db.into_connection());

        // Opened after migration, so the file is guaranteed to exist.
        let read_conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        info!(path = %path.display(), "event store opened");

        Ok(Self {
            worker,
            read_conn: Arc::new(Mutex::new(read_conn)),
            worker_thread: Arc::new(Mutex::new(Some(worker_thread))),
        })
    }

    /// Opens the store at its default file name inside `dir`.
    pub fn open_in(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(dir.as_ref().join(DB_FILE_NAME))
    }

    // =========================================================================
    // Async Lane (worker queue)
    // =========================================================================

    /// Persists `event`, stamped with the time the worker processes it.
    ///
    /// Fire-and-forget: resolves once the event is queued. Storage failures
    /// are logged by the worker and never reach the call site.
    pub async fn capture(&self, event: Event) {
        if let Err(e) = self.worker.capture(event).await {
            warn!(error = %e, "capture dropped");
        }
    }

    /// Returns every record whose id contains `query`, ignoring case and
    /// diacritics, newest first. Failures are logged and yield an empty list.
    pub async fn search_events(&self, query: &str) -> Vec<EventRecord> {
        match self.worker.search(query.to_string()).await {
            Ok(records) => records,
            Err(e) => {
                warn!(query, error = %e, "search failed");
                Vec::new()
            }
        }
    }

    /// Returns up to `limit` records starting at `offset`, newest first.
    /// An offset at or past the end yields an empty page. Failures are
    /// logged and yield an empty list.
    pub async fn fetch_next_page(&self, offset: u64, limit: u64) -> Vec<EventRecord> {
        match self.worker.page(offset, limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!(offset, limit, error = %e, "page fetch failed");
                Vec::new()
            }
        }
    }

    /// Deletes `record` and its parameters.
    ///
    /// Resolves only after the transaction commits, so on `Ok` the caller
    /// may drop its copy of the record knowing the store agrees. Deleting a
    /// record that is already gone is `Ok`.
    pub async fn delete_event(&self, record: &EventRecord) -> Result<()> {
        self.worker.delete(record.record_id).await
    }

    /// Deletes every record and parameter in the store.
    pub async fn clean(&self) -> Result<()> {
        self.worker.clean().await
    }

    /// Drains the queue and stops the worker.
    ///
    /// Every request enqueued before this call is served first. Subsequent
    /// operations on any clone fail with [`crate::Error::Shutdown`] (or, for
    /// the quiet operations, their logged default).
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
        let handle = self
            .worker_thread
            .lock()
            .expect("worker thread mutex poisoned")
            .take();
        if let Some(handle) = handle {
            // The join can wait for a long drain; keep it off the async
            // executor so other tasks stay live meanwhile.
            let _ = tokio::task::spawn_blocking(move || handle.join()).await;
        }
    }

    // =========================================================================
    // Sync Lane (read-only connection)
    // =========================================================================

    /// Total number of persisted records. Failures are logged and read as 0.
    pub fn entities_count(&self) -> u64 {
        let conn = self.read_conn.lock().expect("read connection poisoned");
        match storage::count_events(&conn) {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "count failed");
                0
            }
        }
    }

    /// True iff at least one record has this id and, for every entry of
    /// `parameters`, a parameter with the same key and exactly equal value.
    /// Failures are logged and read as `false`.
    pub fn contains_event(&self, id: &str, parameters: Option<&ParameterMap>) -> bool {
        let predicate = Predicate::from_map(id, parameters);
        let conn = self.read_conn.lock().expect("read connection poisoned");
        match storage::contains_event(&conn, &predicate) {
            Ok(found) => found,
            Err(e) => {
                warn!(id, error = %e, "containment check failed");
                false
            }
        }
    }

    /// Capture time of the most recent record matching `id` and
    /// `parameters`, or `None` when nothing matches. Failures are logged and
    /// read as `None`.
    pub fn last_date_of_event(
        &self,
        id: &str,
        parameters: Option<&ParameterMap>,
    ) -> Option<DateTime<Utc>> {
        let predicate = Predicate::from_map(id, parameters);
        let conn = self.read_conn.lock().expect("read connection poisoned");
        match storage::last_event_date(&conn, &predicate) {
            Ok(date) => date,
            Err(e) => {
                warn!(id, error = %e, "last date lookup failed");
                None
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
