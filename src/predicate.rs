//! # Predicate Builder
//!
//! Translates a high-level query (event id plus optional parameter
//! constraints) into a SQL filter with bound, typed values.
//!
//! ## Shape of the Generated Filter
//!
//! A [`Predicate`] always constrains the event id exactly, and adds one
//! existence probe per parameter constraint:
//!
//! ```sql
//! e.id = ?
//!   AND EXISTS (SELECT 1 FROM parameters p
//!               WHERE p.event_pk = e.event_pk
//!                 AND p.key = ? AND p.string_value = ?)
//!   AND EXISTS (...)
//! ```
//!
//! All clauses are combined with AND; there is no OR, negation, or nesting.
//! Each probe matches the column for the constraint value's variant, so a
//! string constraint never matches an integer parameter even if they render
//! the same.
//!
//! ## No String Interpolation
//!
//! Values travel as bind parameters (`rusqlite::types::Value`), never as
//! spliced SQL text. A hostile event id or parameter key can therefore change
//! *what* is matched but never the query itself.
//!
//! ## Validation
//!
//! None. An empty key or an id that matches nothing simply selects zero rows;
//! building a predicate cannot fail.

use rusqlite::types::Value as SqlValue;

use crate::types::{ParameterMap, ParameterValue};

// =============================================================================
// Predicate
// =============================================================================

/// A conjunction of one id-equality clause and zero or more parameter
/// existence clauses.
///
/// # Example
///
/// ```rust
/// use eventdb::{ParameterValue, Predicate};
///
/// let predicate = Predicate::for_event("LOGIN")
///     .with_parameter("method", ParameterValue::string("password"));
/// let (sql, binds) = predicate.to_sql();
/// assert!(sql.starts_with("e.id = ?"));
/// assert_eq!(binds.len(), 3); // id, key, value
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    event_id: String,
    constraints: Vec<(String, ParameterValue)>,
}

impl Predicate {
    /// Starts a predicate matching records with exactly this event id.
    pub fn for_event(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            constraints: Vec::new(),
        }
    }

    /// Adds a parameter constraint: the record must own at least one
    /// parameter with this key whose variant-matching column equals `value`.
    pub fn with_parameter(mut self, key: impl Into<String>, value: ParameterValue) -> Self {
        self.constraints.push((key.into(), value));
        self
    }

    /// Builds the predicate used by `contains_event` / `last_date_of_event`:
    /// an id clause plus one constraint per entry of `parameters`, if given.
    pub fn from_map(event_id: impl Into<String>, parameters: Option<&ParameterMap>) -> Self {
        let mut predicate = Self::for_event(event_id);
        if let Some(parameters) = parameters {
            for (key, value) in parameters {
                predicate = predicate.with_parameter(key.clone(), value.clone());
            }
        }
        predicate
    }

    /// Renders the WHERE fragment and its bind values.
    ///
    /// The fragment references the `events` table through the alias `e`;
    /// callers embed it as `... FROM events e WHERE <fragment>`.
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::from("e.id = ?");
        let mut binds: Vec<SqlValue> = vec![SqlValue::Text(self.event_id.clone())];

        for (key, value) in &self.constraints {
            let (column, bind) = bind_for_value(value);
            sql.push_str(
                "\n  AND EXISTS (SELECT 1 FROM parameters p WHERE p.event_pk = e.event_pk",
            );
            sql.push_str(&format!(" AND p.key = ? AND p.{column} = ?)"));
            binds.push(SqlValue::Text(key.clone()));
            binds.push(bind);
        }

        (sql, binds)
    }

    /// The event id this predicate matches.
    pub fn event_id(&self) -> &str {
        &self.event_id
    }
}

/// Maps a constraint value to its parameter column and bind value.
///
/// Booleans bind as 0/1 to match their stored form; arrays bind as the
/// canonical JSON encoding, so array equality is encoding equality.
fn bind_for_value(value: &ParameterValue) -> (&'static str, SqlValue) {
    match value {
        ParameterValue::String(s) => ("string_value", SqlValue::Text(s.clone())),
        ParameterValue::Bool(b) => ("boolean_value", SqlValue::Integer(i64::from(*b))),
        ParameterValue::Integer(i) => ("integer_value", SqlValue::Integer(*i)),
        ParameterValue::Array(items) => (
            "array_value",
            // Vec<String> serialization cannot fail.
            SqlValue::Text(serde_json::to_string(items).expect("array encoding")),
        ),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_only_predicate() {
        let (sql, binds) = Predicate::for_event("LOGIN").to_sql();

        assert_eq!(sql, "e.id = ?");
        assert_eq!(binds, vec![SqlValue::Text("LOGIN".to_string())]);
    }

    #[test]
    fn test_parameter_clauses_are_conjunctive() {
        let (sql, binds) = Predicate::for_event("LOGIN")
            .with_parameter("method", ParameterValue::string("password"))
            .with_parameter("remember", ParameterValue::Bool(true))
            .to_sql();

        assert_eq!(sql.matches("AND EXISTS").count(), 2);
        assert!(sql.contains("p.string_value = ?"));
        assert!(sql.contains("p.boolean_value = ?"));
        assert!(!sql.contains(" OR "));
        // id + (key, value) per constraint
        assert_eq!(binds.len(), 5);
        assert_eq!(binds[4], SqlValue::Integer(1));
    }

    #[test]
    fn test_variant_selects_column() {
        for (value, column) in [
            (ParameterValue::string("x"), "string_value"),
            (ParameterValue::Bool(false), "boolean_value"),
            (ParameterValue::Integer(42), "integer_value"),
            (ParameterValue::array(["a"]), "array_value"),
        ] {
            let (sql, _) = Predicate::for_event("E").with_parameter("k", value).to_sql();
            assert!(sql.contains(column), "expected {column} in {sql}");
        }
    }

    #[test]
    fn test_array_binds_canonical_json() {
        let (_, binds) = Predicate::for_event("E")
            .with_parameter("tags", ParameterValue::array(["a", "b"]))
            .to_sql();

        assert_eq!(binds[2], SqlValue::Text(r#"["a","b"]"#.to_string()));
    }

    #[test]
    fn test_from_map_matches_builder() {
        let mut map = ParameterMap::new();
        map.insert("method".to_string(), ParameterValue::string("password"));

        let from_map = Predicate::from_map("LOGIN", Some(&map));
        let built = Predicate::for_event("LOGIN")
            .with_parameter("method", ParameterValue::string("password"));

        assert_eq!(from_map, built);
        assert_eq!(
            Predicate::from_map("LOGIN", None),
            Predicate::for_event("LOGIN")
        );
    }

    /// Hostile input lands in binds, never in the SQL text.
    #[test]
    fn test_values_never_spliced() {
        let (sql, _) = Predicate::for_event("x' OR '1'='1")
            .with_parameter("k' --", ParameterValue::string("'; DROP TABLE events;"))
            .to_sql();

        assert!(!sql.contains("DROP"));
        assert!(!sql.contains("1'='1"));
    }
}
