//! # Synchronous Storage Layer
//!
//! This module provides the core storage operations for EventDB. Every
//! function takes a `rusqlite` connection and runs to completion on the
//! calling thread; the async layering above decides *which* thread that is:
//!
//! - The background worker calls the mutation and multi-row-read functions
//!   on the single read-write connection it owns.
//! - The `EventStore` accessors call the single-row/count functions on the
//!   read-only live connection.
//!
//! ## Ordering
//!
//! Every multi-row read orders by `created_at_ms DESC, event_pk DESC`:
//! newest first, with the strictly-increasing row id breaking timestamp ties.
//! The tie-break keeps repeated page fetches duplicate-free and gap-free even
//! when many events are captured within one millisecond.
//!
//! ## Ownership Rule
//!
//! Parameter rows live and die with their event row. Both delete paths
//! remove children in the same transaction as the parent; there is no other
//! way parameters are ever deleted.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, params_from_iter, Connection};
use tracing::debug;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::error::{Error, Result};
use crate::predicate::Predicate;
use crate::types::{Event, EventId, EventRecord, Parameter, ParameterValue, RecordId};

/// The canonical read order: reverse-chronological, row id as tie-breaker.
const RECENCY_ORDER: &str = "ORDER BY e.created_at_ms DESC, e.event_pk DESC";

// =============================================================================
// Text Folding
// =============================================================================

/// Folds text for case- and diacritic-insensitive matching.
///
/// NFD-decomposes, drops combining marks, then lowercases: `"Café"` and
/// `"cafe"` fold identically. Applied to `id` at insert (stored in `id_fold`)
/// and to the needle at search time, so the two sides always agree.
pub(crate) fn fold_text(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

// =============================================================================
// Mutations
// =============================================================================

/// Inserts one event record and its parameter rows in a single transaction.
///
/// An empty parameter mapping stores no parameter rows at all. Returns the
/// assigned row identity.
pub fn insert_event(
    conn: &mut Connection,
    event: &Event,
    created_at: DateTime<Utc>,
) -> Result<RecordId> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO events (id, id_fold, created_at_ms) VALUES (?, ?, ?)",
        params![
            event.id.as_str(),
            fold_text(event.id.as_str()),
            created_at.timestamp_millis(),
        ],
    )?;
    let record_id = RecordId::from_raw(tx.last_insert_rowid());

    if !event.parameters.is_empty() {
        let mut stmt = tx.prepare(
            "INSERT INTO parameters
                 (event_pk, key, string_value, boolean_value, integer_value, array_value)
             VALUES (?, ?, ?, ?, ?, ?)",
        )?;
        for (key, value) in &event.parameters {
            let (string_value, boolean_value, integer_value, array_value) = split_value(value)?;
            stmt.execute(params![
                record_id.as_raw(),
                key,
                string_value,
                boolean_value,
                integer_value,
                array_value,
            ])?;
        }
        drop(stmt);
    }

    tx.commit()?;
    Ok(record_id)
}

/// Deletes one record and its parameter rows in a single transaction.
///
/// Deleting a record that no longer exists is a no-op, not an error: the
/// record is gone either way.
pub fn delete_event(conn: &mut Connection, record_id: RecordId) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM parameters WHERE event_pk = ?",
        params![record_id.as_raw()],
    )?;
    let deleted = tx.execute(
        "DELETE FROM events WHERE event_pk = ?",
        params![record_id.as_raw()],
    )?;
    tx.commit()?;

    debug!(record_id = record_id.as_raw(), deleted, "record deleted");
    Ok(())
}

/// Deletes every record and every parameter row in a single transaction.
pub fn clean(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM parameters", [])?;
    tx.execute("DELETE FROM events", [])?;
    tx.commit()?;
    Ok(())
}

/// Spreads a [`ParameterValue`] over the four typed columns, exactly one
/// non-null.
#[allow(clippy::type_complexity)]
fn split_value(
    value: &ParameterValue,
) -> Result<(Option<&str>, Option<i64>, Option<i64>, Option<String>)> {
    Ok(match value {
        ParameterValue::String(s) => (Some(s.as_str()), None, None, None),
        ParameterValue::Bool(b) => (None, Some(i64::from(*b)), None, None),
        ParameterValue::Integer(i) => (None, None, Some(*i), None),
        ParameterValue::Array(items) => (None, None, None, Some(serde_json::to_string(items)?)),
    })
}

// =============================================================================
// Multi-Row Reads
// =============================================================================

/// Returns every record whose id contains `query` as a case- and
/// diacritic-insensitive substring, newest first.
///
/// An empty query matches everything (every string contains the empty
/// substring).
pub fn search_events(conn: &Connection, query: &str) -> Result<Vec<EventRecord>> {
    let needle = fold_text(query);
    let mut stmt = conn.prepare(&format!(
        "SELECT e.event_pk, e.id, e.created_at_ms FROM events e
         WHERE instr(e.id_fold, ?) > 0
         {RECENCY_ORDER}"
    ))?;
    let rows = stmt
        .query_map(params![needle], row_to_header)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    attach_parameters(conn, rows)
}

/// Returns up to `limit` records in the canonical order, skipping the first
/// `offset`. An offset at or past the end yields an empty page.
pub fn fetch_page(conn: &Connection, offset: u64, limit: u64) -> Result<Vec<EventRecord>> {
    // SQLite binds are i64, and a negative LIMIT means unbounded. Saturate
    // instead of wrapping: i64::MAX rows is already "everything", and an
    // i64::MAX offset is already "past the end".
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);

    let mut stmt = conn.prepare(&format!(
        "SELECT e.event_pk, e.id, e.created_at_ms FROM events e
         {RECENCY_ORDER}
         LIMIT ? OFFSET ?"
    ))?;
    let rows = stmt
        .query_map(params![limit, offset], row_to_header)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    attach_parameters(conn, rows)
}

/// The `(event_pk, id, created_at_ms)` header of a record, before its
/// parameters are attached.
type RecordHeader = (i64, String, i64);

fn row_to_header(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordHeader> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

/// Materializes full records from headers, preserving their order.
///
/// Parameters for the whole result set are loaded with one query rather than
/// one per record.
fn attach_parameters(conn: &Connection, headers: Vec<RecordHeader>) -> Result<Vec<EventRecord>> {
    let pks: Vec<i64> = headers.iter().map(|(pk, _, _)| *pk).collect();
    let mut parameters = load_parameters(conn, &pks)?;

    headers
        .into_iter()
        .map(|(pk, id, created_at_ms)| {
            Ok(EventRecord {
                record_id: RecordId::from_raw(pk),
                id: EventId::new(id),
                created_at: timestamp_from_millis(created_at_ms)?,
                parameters: parameters.remove(&pk).unwrap_or_default(),
            })
        })
        .collect()
}

/// Maximum record ids per hydration query. SQLite caps bind variables at
/// 32766 per statement; staying far below keeps unbounded result sets
/// (an empty search needle matches everything) working.
const HYDRATION_CHUNK: usize = 500;

/// Loads the parameter rows for the given record ids, grouped by owner.
///
/// Issues one query per [`HYDRATION_CHUNK`] ids rather than one giant `IN`
/// list, so the result-set size never hits the bind-variable limit.
fn load_parameters(conn: &Connection, pks: &[i64]) -> Result<HashMap<i64, Vec<Parameter>>> {
    let mut grouped: HashMap<i64, Vec<Parameter>> = HashMap::new();

    for chunk in pks.chunks(HYDRATION_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT event_pk, key, string_value, boolean_value, integer_value, array_value
             FROM parameters
             WHERE event_pk IN ({placeholders})
             ORDER BY param_pk"
        ))?;

        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            let event_pk: i64 = row.get(0)?;
            let key: String = row.get(1)?;
            let string_value: Option<String> = row.get(2)?;
            let boolean_value: Option<i64> = row.get(3)?;
            let integer_value: Option<i64> = row.get(4)?;
            let array_value: Option<String> = row.get(5)?;
            Ok((
                event_pk,
                key,
                string_value,
                boolean_value,
                integer_value,
                array_value,
            ))
        })?;

        for row in rows {
            let (event_pk, key, string_value, boolean_value, integer_value, array_value) = row?;
            let value = match (string_value, boolean_value, integer_value, array_value) {
                (Some(s), _, _, _) => ParameterValue::String(s),
                (_, Some(b), _, _) => ParameterValue::Bool(b != 0),
                (_, _, Some(i), _) => ParameterValue::Integer(i),
                (_, _, _, Some(json)) => ParameterValue::Array(serde_json::from_str(&json)?),
                (None, None, None, None) => {
                    return Err(Error::Schema(format!(
                        "parameter '{key}' of record {event_pk} has no value in any typed column"
                    )));
                }
            };
            grouped
                .entry(event_pk)
                .or_default()
                .push(Parameter { key, value });
        }
    }

    Ok(grouped)
}

fn timestamp_from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::Schema(format!("stored timestamp {ms} is out of range")))
}

// =============================================================================
// Single-Row / Count Reads
// =============================================================================

/// Total number of persisted records.
pub fn count_events(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// True iff at least one record matches the predicate.
pub fn contains_event(conn: &Connection, predicate: &Predicate) -> Result<bool> {
    let (fragment, binds) = predicate.to_sql();
    let exists: bool = conn.query_row(
        &format!("SELECT EXISTS (SELECT 1 FROM events e WHERE {fragment})"),
        params_from_iter(binds),
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// The capture time of the most recent record matching the predicate, or
/// `None` if nothing matches.
pub fn last_event_date(conn: &Connection, predicate: &Predicate) -> Result<Option<DateTime<Utc>>> {
    let (fragment, binds) = predicate.to_sql();
    let ms: Option<i64> = match conn.query_row(
        &format!(
            "SELECT e.created_at_ms FROM events e WHERE {fragment}
             {RECENCY_ORDER}
             LIMIT 1"
        ),
        params_from_iter(binds),
        |row| row.get(0),
    ) {
        Ok(ms) => Some(ms),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };

    ms.map(timestamp_from_millis).transpose()
}

// =============================================================================
// Tests
// =============================================================================
