//! # EventDB - Persistent Telemetry Event Store
//!
//! EventDB is an embedded store for application telemetry events, built on
//! SQLite. It provides:
//!
//! - **Typed parameters**: strings, booleans, integers, and string arrays,
//!   preserved exactly across persistence
//! - **Fire-and-forget capture**: recording an event never fails at the call
//!   site
//! - **Diacritic-insensitive search**: `"cafe"` finds `"Café Opened"`
//! - **Deterministic pagination**: reverse-chronological, gap- and
//!   duplicate-free across pages
//! - **Typed containment queries**: "has a LOGIN with method=password ever
//!   happened?" without fetching records
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         EventStore                              │
//! │   async: capture, search, page, delete, clean                   │
//! │   sync:  entities_count, contains_event, last_date_of_event     │
//! └──────────────┬─────────────────────────────────┬────────────────┘
//!                │ worker queue (FIFO)             │ direct
//!                ▼                                 ▼
//! ┌──────────────────────────────┐   ┌────────────────────────────┐
//! │        Store Worker          │   │   Read-Only Connection     │
//! │ (single thread, owns the     │   │ (WAL snapshot, may briefly │
//! │  read-write connection)      │   │  trail the worker)         │
//! └──────────────┬───────────────┘   └─────────────┬──────────────┘
//!                │                                 │
//!                └──────────────┬──────────────────┘
//!                               ▼
//!                     ┌──────────────────┐
//!                     │  SQLite (WAL)    │
//!                     └──────────────────┘
//! ```
//!
//! ## Core Invariants
//!
//! 1. **Single writer**: one worker thread owns the only read-write
//!    connection
//! 2. **FIFO**: worker requests execute in exactly their enqueue order
//! 3. **Typed round-trip**: a parameter reads back as the same variant and
//!    value it was stored with
//! 4. **Ownership**: parameter rows are deleted in the same transaction as
//!    their event, and only then
//! 5. **Stable order**: every list read sorts by capture time descending,
//!    with row identity breaking ties
//!
//! ## Module Organization
//!
//! - [`error`]: the crate-wide error enum
//! - [`schema`]: SQLite DDL and versioned migrations
//! - [`types`]: domain types (Event, ParameterValue, EventRecord, ...)
//! - [`predicate`]: typed match conditions compiled to SQL
//! - [`storage`]: synchronous SQL operations on a connection
//! - [`worker`]: the background thread and its channel protocol
//! - [`api`]: the public [`EventStore`] facade

// =============================================================================
// Module Declarations
// =============================================================================

/// Error types for store operations.
pub mod error;

/// SQLite schema definitions, migrations, and database initialization.
pub mod schema;

/// Domain types: events, parameter values, records.
///
/// Uses the newtype pattern for identifiers so an event name and a row id
/// can never be confused.
pub mod types;

/// Typed match conditions over events and their parameters.
///
/// A [`predicate::Predicate`] is built in code and compiled to a
/// parameterized SQL fragment; values are always bound, never interpolated.
pub mod predicate;

/// Synchronous storage operations.
///
/// Plain functions over a `rusqlite` connection. The layers above decide
/// which thread and which connection they run on.
pub mod storage;

/// The background store worker and its handle.
///
/// Single-threaded actor owning the read-write connection; async callers
/// reach it through a bounded FIFO channel.
pub mod worker;

/// The public async facade.
///
/// The main entry point is [`EventStore`](api::EventStore).
pub mod api;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{EventStore, DB_FILE_NAME};
pub use error::{Error, Result};
pub use predicate::Predicate;
pub use schema::Database;
pub use worker::{spawn_worker, StoreRequest, WorkerHandle};

pub use types::{
    Event, EventId, EventRecord, Parameter, ParameterMap, ParameterValue, RecordId,
    EVENT_LOGOUT, EVENT_SCREEN_VIEW, PARAM_SCREEN,
};
