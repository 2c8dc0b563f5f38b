//! # Error Handling for EventDB
//!
//! This module defines the error types used throughout EventDB. We use a single
//! error enum ([`Error`]) to represent all failure modes, which keeps function
//! signatures simple and lets callers handle errors uniformly.
//!
//! ## Error Categories
//!
//! | Category | Examples | Typical Response |
//! |----------|----------|------------------|
//! | Store-open | file unreadable, schema newer than this build | Fatal, abort startup |
//! | Query | malformed filter, I/O error mid-read | Log, surface empty result |
//! | Write | I/O error mid-commit | Log; only `clean`/`delete_event` report back |
//! | Shutdown | worker gone, response dropped | Store lifetime is over |
//!
//! The public `EventStore` surface deliberately swallows most of these:
//! `capture` has no error channel at all, and the synchronous accessors fall
//! back to empty/false/absent values. The [`Error`] type still exists so the
//! storage layer can propagate precisely with `?` before the API decides what
//! to expose.

use thiserror::Error;

// =============================================================================
// Error Type
// =============================================================================

/// All errors that can occur in EventDB operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite operation failed.
    ///
    /// Wraps any error from the `rusqlite` crate: locked database file, full
    /// disk, corruption, or a SQL mistake (which would be a bug in EventDB).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Schema version mismatch or stored data that cannot be interpreted.
    ///
    /// # When This Happens
    ///
    /// - Opening a database created by a newer EventDB version
    /// - A parameter row whose typed columns are all null
    /// - A stored timestamp outside the representable range
    ///
    /// # Recovery
    ///
    /// For version mismatches, upgrade the binary. For corrupted rows, the
    /// affected record is unreadable; the rest of the store is unaffected.
    #[error("schema error: {0}")]
    Schema(String),

    /// A stored array value could not be decoded from its JSON encoding.
    #[error("parameter encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The background worker has shut down; no further operations are possible.
    ///
    /// Returned when a request is submitted after [`EventStore::shutdown`]
    /// (or after the worker thread died). The store's lifetime is normally
    /// the process lifetime, so seeing this outside shutdown indicates a bug.
    ///
    /// [`EventStore::shutdown`]: crate::EventStore::shutdown
    #[error("event store has shut down")]
    Shutdown,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A `Result` type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Error messages appear in logs; keep them readable.
    #[test]
    fn test_error_display() {
        let schema = Error::Schema("bad version".to_string());
        assert_eq!(schema.to_string(), "schema error: bad version");

        assert_eq!(Error::Shutdown.to_string(), "event store has shut down");
    }

    /// The `#[from]` attribute lets `?` convert rusqlite errors automatically.
    #[test]
    fn test_sqlite_error_conversion() {
        let sqlite_err = rusqlite::Error::InvalidParameterName("test".to_string());
        let our_err: Error = sqlite_err.into();

        assert!(matches!(our_err, Error::Sqlite(_)));
        assert!(our_err.to_string().contains("sqlite error"));
    }
}
