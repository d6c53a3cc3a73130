//! # Scoped Equality Filters
//!
//! A [`FilterSet`] is an immutable ordered set of `column = value`
//! constraints. Derived tables carry one; it is ANDed into every read and
//! delete predicate, merged into every insert payload, and checked against
//! every update payload. Composition is union with conflict detection:
//! re-constraining a column to the same value is allowed, to a different
//! value is an error.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::errors::{ColumnValues, ValidationKind};

/// Immutable ordered mapping of column to required value
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FilterSet {
    constraints: Vec<(String, Value)>,
}

impl FilterSet {
    /// The empty filter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any constraint is present
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Number of constrained columns
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// The fixed value for a column, if it is constrained
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.constraints
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Constraint pairs in composition order
    pub fn pairs(&self) -> &[(String, Value)] {
        &self.constraints
    }

    /// Union of this set and the given constraints.
    ///
    /// Constraints already present with an equal value are absorbed, so
    /// composing the same constraint twice is a no-op. The same column
    /// with a different value is a [`ValidationKind::FilterConflict`].
    pub fn compose<'a, I>(&self, constraints: I) -> Result<FilterSet, ValidationKind>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut merged = self.constraints.clone();
        for (column, value) in constraints {
            match merged.iter().find(|(name, _)| name == column) {
                Some((_, existing)) if *existing == value => {}
                Some((_, existing)) => {
                    return Err(ValidationKind::FilterConflict {
                        column: column.to_string(),
                        existing: existing.clone(),
                        attempted: value,
                    });
                }
                None => merged.push((column.to_string(), value)),
            }
        }
        Ok(FilterSet {
            constraints: merged,
        })
    }

    /// The constraints as error context
    pub fn to_column_values(&self) -> ColumnValues {
        ColumnValues(self.constraints.clone())
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_column_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compose_unions_in_order() {
        let base = FilterSet::new()
            .compose([("org", json!("acme"))])
            .unwrap();
        let derived = base.compose([("active", json!(true))]).unwrap();

        assert_eq!(derived.len(), 2);
        assert_eq!(derived.pairs()[0].0, "org");
        assert_eq!(derived.pairs()[1].0, "active");
        assert_eq!(derived.get("active"), Some(&json!(true)));

        // parent unchanged
        assert_eq!(base.len(), 1);
        assert_eq!(base.get("active"), None);
    }

    #[test]
    fn test_recomposing_equal_value_is_noop() {
        let once = FilterSet::new().compose([("a", json!(1))]).unwrap();
        let twice = once.compose([("a", json!(1))]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_conflicting_value_is_rejected() {
        let set = FilterSet::new().compose([("a", json!(1))]).unwrap();
        let err = set.compose([("a", json!(2))]).unwrap_err();
        match err {
            ValidationKind::FilterConflict {
                column,
                existing,
                attempted,
            } => {
                assert_eq!(column, "a");
                assert_eq!(existing, json!(1));
                assert_eq!(attempted, json!(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_conflict_within_one_compose_call() {
        let err = FilterSet::new()
            .compose([("a", json!(1)), ("a", json!(2))])
            .unwrap_err();
        assert!(matches!(err, ValidationKind::FilterConflict { .. }));
    }

    #[test]
    fn test_display_shows_pairs() {
        let set = FilterSet::new()
            .compose([("name", json!("Alice")), ("n", json!(3))])
            .unwrap();
        assert_eq!(set.to_string(), "name=\"Alice\", n=3");
    }
}
