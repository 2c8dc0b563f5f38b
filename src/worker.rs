//! # Background Store Worker
//!
//! This module implements the actor pattern around the storage layer: one
//! dedicated thread owns the read-write connection, and everything else talks
//! to it through a channel.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Async Callers                            │
//! │        (capture / search / page / delete / clean)            │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │  WorkerHandle (Clone)
//!                                ▼
//!                    ┌───────────────────────┐
//!                    │   bounded mpsc queue  │   strict FIFO
//!                    └───────────┬───────────┘
//!                                ▼
//!                    ┌───────────────────────┐
//!                    │     StoreWorker       │
//!                    │     (1 thread)        │
//!                    │  ┌─────────────────┐  │
//!                    │  │ Connection (R/W)│  │
//!                    │  └─────────────────┘  │
//!                    └───────────┬───────────┘
//!                                ▼
//!                        ┌──────────────┐
//!                        │ SQLite (WAL) │
//!                        └──────────────┘
//! ```
//!
//! ## Ordering Guarantee
//!
//! One channel, one thread: every request is executed in exactly the order
//! it entered the queue. A capture followed by a search through the same
//! handle always sees its own write.
//!
//! ## Why Captures Carry No Response Channel
//!
//! Capture is fire-and-forget. The caller's await resolves as soon as the
//! request is enqueued; the worker logs the outcome instead of reporting it
//! back. A full disk must never surface an error at a capture call site.

use std::thread::{self, JoinHandle};

use chrono::Utc;
use rusqlite::Connection;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::storage;
use crate::types::{Event, EventRecord, RecordId};

/// Maximum number of pending requests in the store queue.
const CHANNEL_BOUND: usize = 1024;

// =============================================================================
// Requests
// =============================================================================

/// Request types processed by the store worker.
pub enum StoreRequest {
    /// Persist one event, stamped with the worker's current time.
    ///
    /// No response channel: see the module docs.
    Capture { event: Event },

    /// Substring search over event ids, newest first.
    Search {
        query: String,
        response_tx: oneshot::Sender<Result<Vec<EventRecord>>>,
    },

    /// Fetch one page of records in reverse-chronological order.
    Page {
        offset: u64,
        limit: u64,
        response_tx: oneshot::Sender<Result<Vec<EventRecord>>>,
    },

    /// Delete one record and its parameters.
    Delete {
        record_id: RecordId,
        response_tx: oneshot::Sender<Result<()>>,
    },

    /// Delete every record.
    Clean {
        response_tx: oneshot::Sender<Result<()>>,
    },

    /// Drain nothing further; exit the worker loop.
    Shutdown,
}

// =============================================================================
// Handle
// =============================================================================

/// A cloneable async handle to the store worker.
///
/// All clones feed the same queue and therefore the same connection; cloning
/// never creates a second writer.
///
/// # Errors
///
/// Every method maps a closed channel to [`Error::Shutdown`]: it means the
/// worker has exited and no further requests can be served.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    request_tx: mpsc::Sender<StoreRequest>,
}

impl WorkerHandle {
    /// Enqueues one event for persistence.
    ///
    /// Resolves when the request is queued, not when the row is committed.
    pub async fn capture(&self, event: Event) -> Result<()> {
        self.request_tx
            .send(StoreRequest::Capture { event })
            .await
            .map_err(|_| Error::Shutdown)
    }

    /// Searches event ids for `query`, case- and diacritic-insensitively.
    pub async fn search(&self, query: String) -> Result<Vec<EventRecord>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(StoreRequest::Search { query, response_tx })
            .await
            .map_err(|_| Error::Shutdown)?;
        response_rx.await.map_err(|_| Error::Shutdown)?
    }

    /// Fetches up to `limit` records starting at `offset`.
    pub async fn page(&self, offset: u64, limit: u64) -> Result<Vec<EventRecord>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(StoreRequest::Page {
                offset,
                limit,
                response_tx,
            })
            .await
            .map_err(|_| Error::Shutdown)?;
        response_rx.await.map_err(|_| Error::Shutdown)?
    }

    /// Deletes one record. Resolves after the transaction commits.
    pub async fn delete(&self, record_id: RecordId) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(StoreRequest::Delete {
                record_id,
                response_tx,
            })
            .await
            .map_err(|_| Error::Shutdown)?;
        response_rx.await.map_err(|_| Error::Shutdown)?
    }

    /// Deletes every record. Resolves after the transaction commits.
    pub async fn clean(&self) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(StoreRequest::Clean { response_tx })
            .await
            .map_err(|_| Error::Shutdown)?;
        response_rx.await.map_err(|_| Error::Shutdown)?
    }

    /// Asks the worker to exit once every queued request has been served.
    pub async fn shutdown(&self) {
        let _ = self.request_tx.send(StoreRequest::Shutdown).await;
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Spawns the store worker on a dedicated thread.
///
/// Consumes the connection, so only one writer can ever exist for it. The
/// returned join handle completes after [`StoreRequest::Shutdown`] is served
/// or every [`WorkerHandle`] clone has been dropped.
pub fn spawn_worker(conn: Connection) -> (WorkerHandle, JoinHandle<()>) {
    let (request_tx, request_rx) = mpsc::channel(CHANNEL_BOUND);

    let thread_handle = thread::Builder::new()
        .name("eventdb-worker".to_string())
        .spawn(move || {
            run_worker(conn, request_rx);
        })
        .expect("failed to spawn store worker thread");

    (WorkerHandle { request_tx }, thread_handle)
}

/// The worker's main loop. Blocking receives keep requests strictly FIFO.
fn run_worker(mut conn: Connection, mut request_rx: mpsc::Receiver<StoreRequest>) {
    while let Some(request) = request_rx.blocking_recv() {
        match request {
            StoreRequest::Capture { event } => {
                let created_at = Utc::now();
                match storage::insert_event(&mut conn, &event, created_at) {
                    Ok(record_id) => {
                        info!(
                            id = event.id.as_str(),
                            record_id = record_id.as_raw(),
                            "event saved"
                        );
                    }
                    Err(e) => {
                        error!(id = event.id.as_str(), error = %e, "failed to save event");
                    }
                }
            }
            StoreRequest::Search { query, response_tx } => {
                let _ = response_tx.send(storage::search_events(&conn, &query));
            }
            StoreRequest::Page {
                offset,
                limit,
                response_tx,
            } => {
                let _ = response_tx.send(storage::fetch_page(&conn, offset, limit));
            }
            StoreRequest::Delete {
                record_id,
                response_tx,
            } => {
                let _ = response_tx.send(storage::delete_event(&mut conn, record_id));
            }
            StoreRequest::Clean { response_tx } => {
                let _ = response_tx.send(storage::clean(&mut conn));
            }
            StoreRequest::Shutdown => break,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
