//! # SQLite Schema for EventDB
//!
//! This module defines the database schema and handles initialization and
//! migration. The schema is small and append-mostly: the dominant write is
//! insert, and the only other writes are whole-record delete and bulk wipe.
//!
//! ## Table Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Schema Overview                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  events                       parameters                     │
//! │  ┌───────────────┐            ┌────────────────┐             │
//! │  │ event_pk (PK) │◄───────────│ event_pk       │             │
//! │  │ id            │            │ param_pk (PK)  │             │
//! │  │ id_fold       │            │ key            │             │
//! │  │ created_at_ms │            │ string_value   │             │
//! │  └───────────────┘            │ boolean_value  │             │
//! │                               │ integer_value  │             │
//! │  eventdb_migrations           │ array_value    │             │
//! │  (version ledger)             └────────────────┘             │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Decisions
//!
//! ### Why `id_fold`?
//!
//! Substring search over event names is case- and diacritic-insensitive.
//! SQLite's built-in `LOWER`/`LIKE` only fold ASCII, so we store a
//! pre-computed Unicode fold of `id` beside it and fold the needle at query
//! time. The fold is computed once per insert instead of once per candidate
//! row per search.
//!
//! ### Why no `ON DELETE CASCADE`?
//!
//! Parameter rows are owned by their event row, but the ownership rule is
//! enforced by the engine itself: every delete path removes the children in
//! the same transaction as the parent. Keeping the rule in code rather than
//! in a relationship flag means the cascade works identically on databases
//! created before the constraint existed and is visible at the call site.
//!
//! ### Migrations
//!
//! Additive schema changes ship as numbered migration steps applied
//! automatically on open, recorded in `eventdb_migrations`. Opening a
//! database whose recorded version is *newer* than this build fails: we never
//! write into a schema we don't understand.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::{Error, Result};

// =============================================================================
// Migrations
// =============================================================================

/// One schema migration step. Steps are strictly additive and applied in
/// version order; a database at version N gets every step with version > N.
struct Migration {
    version: i32,
    name: &'static str,
    statements: &'static [&'static str],
}

/// The `events` table: one row per captured record.
///
/// # Columns
///
/// - `event_pk`: Auto-increment row identity ([`RecordId`](crate::RecordId)).
///   Strictly increasing, never reused, which makes it the tie-breaker for
///   records sharing a `created_at_ms`.
/// - `id`: The event name as captured. Not unique.
/// - `id_fold`: Case/diacritic fold of `id`, used by substring search.
/// - `created_at_ms`: Capture time as Unix milliseconds. Never null, never
///   updated after insert.
const CREATE_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    event_pk      INTEGER PRIMARY KEY AUTOINCREMENT,
    id            TEXT NOT NULL,
    id_fold       TEXT NOT NULL,
    created_at_ms INTEGER NOT NULL
)
"#;

/// Index serving reverse-chronological reads (search, pagination,
/// last-date). Matches the canonical ordering `created_at_ms DESC,
/// event_pk DESC` exactly, so pages are a pure index walk.
const CREATE_EVENTS_CREATED_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS events_created_at
ON events(created_at_ms DESC, event_pk DESC)
"#;

/// Index serving exact-id predicates (`contains_event`, `last_date_of_event`).
const CREATE_EVENTS_ID_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS events_id
ON events(id)
"#;

/// The `parameters` table: typed key/value rows owned by one event row.
///
/// # Columns
///
/// - `param_pk`: Auto-increment row identity.
/// - `event_pk`: The owning event row. Children are deleted transactionally
///   with their parent (see module docs).
/// - `key`: Parameter name. Not unique per event.
/// - `string_value` / `boolean_value` / `integer_value` / `array_value`:
///   Exactly one is non-null, matching the value's variant. Booleans are
///   stored as 0/1; arrays as canonical JSON text.
const CREATE_PARAMETERS: &str = r#"
CREATE TABLE IF NOT EXISTS parameters (
    param_pk      INTEGER PRIMARY KEY AUTOINCREMENT,
    event_pk      INTEGER NOT NULL,
    key           TEXT NOT NULL,
    string_value  TEXT,
    boolean_value INTEGER,
    integer_value INTEGER,
    array_value   TEXT
)
"#;

/// Index for loading a record's parameters and for the per-parameter EXISTS
/// probes issued by predicates.
const CREATE_PARAMETERS_EVENT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS parameters_event
ON parameters(event_pk)
"#;

/// Statements making up migration v1. Kept as individual constants so each
/// table and index carries its own documentation.
const INITIAL_SCHEMA: &[&str] = &[
    CREATE_EVENTS,
    CREATE_EVENTS_CREATED_INDEX,
    CREATE_EVENTS_ID_INDEX,
    CREATE_PARAMETERS,
    CREATE_PARAMETERS_EVENT_INDEX,
];

/// All migrations in order. New schema work goes at the end with the next
/// version number; released entries are frozen.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    statements: INITIAL_SCHEMA,
}];

/// The migration ledger. `applied_at_ms` is informational only.
const CREATE_MIGRATIONS_LEDGER: &str = r#"
CREATE TABLE IF NOT EXISTS eventdb_migrations (
    version       INTEGER PRIMARY KEY,
    name          TEXT NOT NULL,
    applied_at_ms INTEGER NOT NULL
)
"#;

// =============================================================================
// Database Wrapper
// =============================================================================

/// A SQLite connection with the EventDB schema applied.
///
/// `Database` owns its `Connection`; the file handle closes when it is
/// dropped. After [`Database::open`] the schema is current and the connection
/// is ready for [`spawn_worker`](crate::worker::spawn_worker).
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database file, creating and initializing it if necessary.
    ///
    /// Pragmas are applied first (WAL journaling so a separate read-only
    /// connection always sees the latest committed state), then pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// - [`Error::Sqlite`] if the file can't be opened or created
    /// - [`Error::Schema`] if the database was written by a newer EventDB
    ///
    /// There is no degraded mode: a store that fails to open is unusable and
    /// callers are expected to treat this as fatal.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let mut db = Self { conn };
        db.initialize()?;
        info!(path = %path.display(), "event database opened");
        Ok(db)
    }

    /// Creates an in-memory database for testing.
    ///
    /// In-memory databases are lost when the connection closes, and cannot be
    /// shared with a second (read-only) connection, so the async `EventStore`
    /// never uses this; it exists for storage-layer unit tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Consumes the wrapper, handing the initialized connection to the worker.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Applies pragmas and pending migrations. Idempotent.
    fn initialize(&mut self) -> Result<()> {
        // WAL: readers on a second connection see a consistent snapshot while
        // the worker commits. NORMAL sync is the usual WAL trade: on an OS
        // crash the last transaction may be lost, never corrupted.
        self.conn.execute_batch("PRAGMA journal_mode = WAL")?;
        self.conn.execute_batch("PRAGMA synchronous = NORMAL")?;
        self.conn.execute_batch("PRAGMA foreign_keys = ON")?;

        self.run_migrations()
    }

    /// Applies every migration newer than the database's recorded version.
    fn run_migrations(&mut self) -> Result<()> {
        self.conn.execute_batch(CREATE_MIGRATIONS_LEDGER)?;

        let current: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM eventdb_migrations",
            [],
            |row| row.get(0),
        )?;

        let newest = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);
        if current > i64::from(newest) {
            return Err(Error::Schema(format!(
                "database schema version {current} is newer than this build supports ({newest})"
            )));
        }

        debug!(current_version = current, "checking migrations");

        for migration in MIGRATIONS {
            if i64::from(migration.version) <= current {
                continue;
            }

            info!(
                version = migration.version,
                name = migration.name,
                "applying migration"
            );

            let tx = self.conn.transaction()?;
            for stmt in migration.statements {
                tx.execute_batch(stmt)?;
            }
            tx.execute(
                "INSERT INTO eventdb_migrations (version, name, applied_at_ms) VALUES (?, ?, ?)",
                rusqlite::params![
                    migration.version,
                    migration.name,
                    chrono::Utc::now().timestamp_millis()
                ],
            )?;
            tx.commit()?;
        }

        Ok(())
    }

    /// Test-only access to the underlying connection.
    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().expect("should create in-memory db");

        let count: i32 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .expect("should query tables");

        // events, parameters, eventdb_migrations
        assert_eq!(count, 3, "expected 3 tables");
    }

    #[test]
    fn test_indexes_created() {
        let db = Database::open_in_memory().expect("should create db");

        let indexes: Vec<String> = {
            let mut stmt = db
                .conn
                .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND name NOT LIKE 'sqlite_%'")
                .expect("should prepare");

            stmt.query_map([], |row| row.get(0))
                .expect("should query")
                .collect::<std::result::Result<Vec<_>, _>>()
                .expect("should collect")
        };

        assert!(indexes.contains(&"events_created_at".to_string()));
        assert!(indexes.contains(&"events_id".to_string()));
        assert!(indexes.contains(&"parameters_event".to_string()));
    }

    #[test]
    fn test_migration_version_recorded() {
        let db = Database::open_in_memory().expect("should create db");

        let version: i64 = db
            .conn
            .query_row(
                "SELECT MAX(version) FROM eventdb_migrations",
                [],
                |row| row.get(0),
            )
            .expect("should query version");

        assert_eq!(version, 1);
    }

    /// Opening the same file twice must be a no-op the second time.
    #[test]
    fn test_double_initialization() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("test.db");

        {
            let _db = Database::open(&path).expect("first open should work");
        }

        {
            let db = Database::open(&path).expect("second open should work");

            let applied: i64 = db
                .conn
                .query_row("SELECT COUNT(*) FROM eventdb_migrations", [], |row| {
                    row.get(0)
                })
                .expect("should query");

            assert_eq!(applied, 1, "migration must not re-apply");
        }
    }

    /// A database stamped with a future version must refuse to open.
    #[test]
    fn test_newer_schema_rejected() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("future.db");

        {
            let db = Database::open(&path).expect("open should work");
            db.conn
                .execute(
                    "INSERT INTO eventdb_migrations (version, name, applied_at_ms) VALUES (999, 'from_the_future', 0)",
                    [],
                )
                .expect("should insert");
        }

        let err = Database::open(&path).expect_err("should reject newer schema");
        assert!(matches!(err, Error::Schema(_)));
    }
}
