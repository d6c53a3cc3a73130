//! # Error Taxonomy
//!
//! Unified failure categories for the data-access layer.
//!
//! Every error carries the relation it concerns plus the offending
//! column(s) or filter pairs, so callers can branch on failures
//! programmatically instead of parsing messages. Input-shape and
//! filter-consistency problems are raised before any backend call;
//! backend constraint reports are re-classified into [`DbError::Integrity`]
//! at the execution boundary.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Result type for all data-access operations
pub type DbResult<T> = Result<T, DbError>;

/// Column/value pairs attached to an error, shown as `a=1, b="x"`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnValues(pub Vec<(String, Value)>);

impl ColumnValues {
    /// Builds the pair list from borrowed keys.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// The constrained column names, in order.
    pub fn columns(&self) -> Vec<&str> {
        self.0.iter().map(|(k, _)| k.as_str()).collect()
    }
}

impl fmt::Display for ColumnValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

/// Which reflection-cache namespace a lookup addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Base tables
    Tables,
    /// Views
    Views,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Tables => write!(f, "tables"),
            Namespace::Views => write!(f, "views"),
        }
    }
}

/// Constraint kinds reported by the backend on integrity violations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// UNIQUE constraint
    Unique,
    /// PRIMARY KEY constraint
    PrimaryKey,
    /// FOREIGN KEY constraint
    ForeignKey,
}

impl ConstraintKind {
    /// Stable tag for logs and programmatic handling
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::PrimaryKey => "primary_key",
            ConstraintKind::ForeignKey => "foreign_key",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Malformed-input failures, raised before any backend call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationKind {
    /// Record is missing one or more primary-key values
    #[error("missing primary key value(s) for columns {columns:?}")]
    MissingPk {
        /// PK columns with no value in the record
        columns: Vec<String>,
    },

    /// `lookup` called without any criteria
    #[error("lookup requires at least one criterion")]
    EmptyLookup,

    /// Filter composition saw the same column with two different values
    #[error("conflicting filter on '{column}': {existing} vs {attempted}")]
    FilterConflict {
        /// The doubly-constrained column
        column: String,
        /// Value already fixed by the filter set
        existing: Value,
        /// Value the new constraint attempted to fix
        attempted: Value,
    },

    /// Write payload disagrees with a fixed filter value
    #[error("payload value {supplied} for '{column}' disagrees with fixed filter value {fixed}")]
    FilterViolation {
        /// The filtered column
        column: String,
        /// Value fixed by the filter set
        fixed: Value,
        /// Value the caller supplied
        supplied: Value,
    },

    /// Primary-key value arity does not match the PK column count
    #[error("primary key has {expected} column(s) but {got} value(s) were given")]
    BadPkShape {
        /// Declared PK column count
        expected: usize,
        /// Values supplied by the caller
        got: usize,
    },

    /// Descriptor or catalog metadata declared no columns
    #[error("schema declares no columns")]
    NoFields,

    /// Descriptor declared the same column name twice
    #[error("duplicate column '{column}'")]
    DuplicateColumn {
        /// The repeated name
        column: String,
    },
}

/// Schema-shape failures: the request names things the schema does not have
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaKind {
    /// Criterion or constraint names a column absent from the schema
    #[error("no column '{column}'")]
    ColumnNotFound {
        /// The unknown column
        column: String,
    },

    /// Declared primary key names a field absent from the descriptor
    #[error("primary key column '{column}' is not a declared field")]
    PkNotFound {
        /// The missing PK column
        column: String,
    },

    /// Type descriptor or catalog type has no storage-class mapping
    #[error("unsupported type '{declared}' for column '{column}'")]
    UnsupportedType {
        /// The affected column
        column: String,
        /// The descriptor or catalog type name as given
        declared: String,
    },

    /// Reflection addressed a relation the catalog does not list
    #[error("relation not present in catalog")]
    RelationNotFound,
}

/// Data-access errors
#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// No row matched a point or criteria query
    #[error("no row in '{table}' matching {filters}")]
    NotFound {
        /// Relation queried
        table: String,
        /// The full predicate that matched nothing (PK pairs and scope filters)
        filters: ColumnValues,
    },

    /// Backend constraint violation, re-classified at the execution boundary
    #[error("{kind} constraint violated on '{table}': {detail}")]
    Integrity {
        /// Relation written
        table: String,
        /// Best-effort constraint classification
        kind: ConstraintKind,
        /// Backend-reported detail
        detail: String,
    },

    /// Malformed input, detected before any backend call
    #[error("invalid input for '{table}': {kind}")]
    Validation {
        /// Relation addressed
        table: String,
        /// What was malformed
        kind: ValidationKind,
    },

    /// Request referenced schema elements that do not exist
    #[error("schema error on '{table}': {kind}")]
    Schema {
        /// Relation addressed
        table: String,
        /// What was missing or unsupported
        kind: SchemaKind,
    },

    /// Backend unreachable
    #[error("backend unreachable: {0}")]
    Connection(String),

    /// Mutation attempted on a view
    #[error("operation '{operation}' is not allowed on view '{target}'")]
    InvalidOperation {
        /// The rejected operation
        operation: &'static str,
        /// The view's name
        target: String,
    },

    /// Synchronous cache lookup before the name was reflected.
    ///
    /// A usage/state error, not a data error: reflect (or create) the
    /// relation first, then look it up.
    #[error("'{name}' is not in the {namespace} cache; reflect it first")]
    NotCached {
        /// Which namespace was consulted
        namespace: Namespace,
        /// The requested name
        name: String,
    },

    /// Unclassifiable backend failure, surfaced rather than swallowed
    #[error("unexpected backend failure on '{table}': {detail}")]
    Backend {
        /// Relation involved
        table: String,
        /// Raw backend detail
        detail: String,
    },
}

impl DbError {
    /// Shorthand for a [`DbError::Validation`]
    pub fn validation(table: impl Into<String>, kind: ValidationKind) -> Self {
        Self::Validation {
            table: table.into(),
            kind,
        }
    }

    /// Shorthand for a [`DbError::Schema`]
    pub fn schema(table: impl Into<String>, kind: SchemaKind) -> Self {
        Self::Schema {
            table: table.into(),
            kind,
        }
    }

    /// Shorthand for a [`DbError::NotFound`]
    pub fn not_found(table: impl Into<String>, filters: ColumnValues) -> Self {
        Self::NotFound {
            table: table.into(),
            filters,
        }
    }

    /// The relation this error concerns, when one applies
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::NotFound { table, .. }
            | Self::Integrity { table, .. }
            | Self::Validation { table, .. }
            | Self::Schema { table, .. }
            | Self::Backend { table, .. } => Some(table),
            Self::InvalidOperation { target, .. } => Some(target),
            Self::NotCached { name, .. } => Some(name),
            Self::Connection(_) => None,
        }
    }

    /// True for failures raised before any backend call
    pub fn is_fail_fast(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Schema { .. } | Self::InvalidOperation { .. }
        )
    }
}
