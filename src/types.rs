//! # Domain Types for EventDB
//!
//! This module defines the core types of the telemetry domain: typed parameter
//! values, capture-side events, and the durable records handed back by reads.
//!
//! ## Design Philosophy: Newtypes for Safety
//!
//! Identifiers are wrapped in single-field structs rather than passed around
//! as bare primitives:
//!
//! - **Type safety**: a [`RecordId`] (row identity) can't be confused with an
//!   [`EventId`] (event *name*, shared by many records)
//! - **Self-documenting code**: signatures say what they expect
//! - **Encapsulation**: representation can change without touching callers
//!
//! ## Input vs Output Shapes
//!
//! [`Event`] is the capture input: a name plus a key/value parameter mapping.
//! [`EventRecord`] is the read output: the same data with the row identity and
//! the capture timestamp assigned by the store. An `EventRecord` is never
//! mutated after creation; the only destructive operations are whole-record
//! delete and bulk clean.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Event Identification
// =============================================================================

/// The name of a telemetry event, e.g. `"LOGIN"` or `"SCREEN_VIEW"`.
///
/// This is *not* a row key: many records may carry the same `EventId`. Row
/// identity is [`RecordId`].
///
/// # Example
///
/// ```rust
/// use eventdb::EventId;
///
/// let id = EventId::new("LOGIN");
/// assert_eq!(id.as_str(), "LOGIN");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new event id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this event id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The durable row identity of one captured record.
///
/// Assigned by SQLite at insert time and strictly increasing, which also makes
/// it the tie-breaker when two records share a capture timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(i64);

impl RecordId {
    /// Creates a `RecordId` from a raw rowid value.
    ///
    /// Primarily for reading from the database; normal code receives record
    /// ids inside [`EventRecord`]s.
    pub fn from_raw(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw rowid value for database binding.
    pub fn as_raw(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Parameter Values
// =============================================================================

/// A typed value attachable to an event, one variant active per value.
///
/// The variant set is closed: producers pick one of four shapes and the store
/// persists exactly that shape. Variant plus payload are immutable once
/// constructed.
///
/// # Storage
///
/// Each variant maps to its own column in the `parameters` table
/// (`string_value`, `boolean_value`, `integer_value`, `array_value`); at most
/// one is non-null per row. Arrays are stored as canonical JSON text, so array
/// equality in queries is equality of the JSON encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    /// A text value.
    String(String),
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer value.
    Integer(i64),
    /// An ordered sequence of text values.
    Array(Vec<String>),
}

impl ParameterValue {
    /// Convenience constructor for string values.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Convenience constructor for array values.
    pub fn array<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array(values.into_iter().map(Into::into).collect())
    }
}

/// A typed key/value pair attached to one record.
///
/// Owned exclusively by the [`EventRecord`] it was created under and deleted
/// with it. Keys are not required to be unique within a record (producers are
/// expected not to repeat them, but the store does not enforce it), which is
/// why records carry a `Vec<Parameter>` rather than a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// The parameter name.
    pub key: String,
    /// The typed value.
    pub value: ParameterValue,
}

/// The parameter mapping accepted by `capture` and by parameter predicates.
///
/// A `BTreeMap` so iteration order is deterministic, which gives stable SQL
/// text for a given filter.
pub type ParameterMap = BTreeMap<String, ParameterValue>;

// =============================================================================
// Events
// =============================================================================

/// Built-in event id captured when a screen becomes visible.
pub const EVENT_SCREEN_VIEW: &str = "SCREEN_VIEW";

/// Built-in event id captured when the user logs out.
pub const EVENT_LOGOUT: &str = "LOGOUT";

/// Parameter key carrying the screen name for [`EVENT_SCREEN_VIEW`].
pub const PARAM_SCREEN: &str = "screen";

/// An event to be captured.
///
/// This is the "input" form - what the caller provides. It has no timestamp or
/// row identity yet; those are assigned when the background worker commits it.
///
/// # Example
///
/// ```rust
/// use eventdb::{Event, ParameterValue};
///
/// let event = Event::new("LOGIN")
///     .with_parameter("method", ParameterValue::string("password"));
/// assert_eq!(event.id.as_str(), "LOGIN");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The event name.
    pub id: EventId,

    /// Typed parameters keyed by name.
    ///
    /// May be empty; an empty mapping stores no parameter rows at all.
    pub parameters: ParameterMap,
}

impl Event {
    /// Creates an event with no parameters.
    pub fn new(id: impl Into<EventId>) -> Self {
        Self {
            id: id.into(),
            parameters: ParameterMap::new(),
        }
    }

    /// Adds a parameter (builder pattern).
    pub fn with_parameter(mut self, key: impl Into<String>, value: ParameterValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Replaces the whole parameter mapping (builder pattern).
    pub fn with_parameters(mut self, parameters: ParameterMap) -> Self {
        self.parameters = parameters;
        self
    }

    /// The screen-view telemetry event for the named screen.
    pub fn view_screen(screen: impl Into<String>) -> Self {
        Self::new(EVENT_SCREEN_VIEW).with_parameter(PARAM_SCREEN, ParameterValue::string(screen))
    }

    /// The logout telemetry event. Carries no parameters.
    pub fn logout() -> Self {
        Self::new(EVENT_LOGOUT)
    }
}

/// A stored record with its assigned identity and capture timestamp.
///
/// This is the "output" form - what reads hand back. `created_at` is set once
/// at capture time and never updated; a persisted record always has one (a
/// record without a timestamp is never surfaced by any read path).
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Durable row identity, used to address this record for deletion.
    pub record_id: RecordId,

    /// The event name.
    pub id: EventId,

    /// When the event was captured.
    pub created_at: DateTime<Utc>,

    /// The parameters stored with this record. Empty if the event was
    /// captured with an empty mapping.
    pub parameters: Vec<Parameter>,
}

// =============================================================================
// Tests
// =============================================================================
