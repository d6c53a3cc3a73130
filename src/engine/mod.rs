//! # Execution Collaborator Interface
//!
//! The data-access layer never talks SQL text to a backend. It issues
//! structured [`Statement`] values through the [`SqlEngine`] trait and the
//! engine owns dialect rendering, connections, and execution. This keeps
//! the core dialect-neutral and lets tests substitute an in-memory engine.
//!
//! Engines report failures as [`EngineError`]; constraint violations are
//! tagged with a best-effort [`ConstraintKind`] so the table layer can
//! re-classify them for callers.

pub mod memory;

pub use memory::MemoryEngine;

use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::errors::ConstraintKind;
use crate::record::Row;
use crate::schema::TableSchema;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures reported by an execution engine
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Backend unreachable or connection lost
    #[error("connection failure: {0}")]
    Connection(String),

    /// A constraint rejected the write
    #[error("{kind} constraint violation: {detail}")]
    Constraint {
        /// Best-effort constraint classification
        kind: ConstraintKind,
        /// Backend-reported detail
        detail: String,
    },

    /// Statement addressed a relation the backend does not have
    #[error("unknown relation '{0}'")]
    UnknownRelation(String),

    /// Anything the engine could not classify
    #[error("{0}")]
    Other(String),
}

/// An equality-predicated read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectQuery {
    /// Relation to read
    pub relation: String,
    /// Columns to project; empty means all
    pub columns: Vec<String>,
    /// Conjunction of `column = value` predicates
    pub equals: Vec<(String, Value)>,
    /// Row cap
    pub limit: Option<usize>,
}

impl SelectQuery {
    /// An unfiltered, unprojected read of a relation
    pub fn all(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            columns: Vec::new(),
            equals: Vec::new(),
            limit: None,
        }
    }

    /// Adds an equality predicate
    pub fn filter(mut self, column: impl Into<String>, value: Value) -> Self {
        self.equals.push((column.into(), value));
        self
    }
}

/// A structured statement issued to the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    /// Read rows
    Select(SelectQuery),
    /// Insert one row
    Insert {
        relation: String,
        values: Vec<(String, Value)>,
    },
    /// Insert-or-update keyed on the given columns, atomic at the backend
    Upsert {
        relation: String,
        values: Vec<(String, Value)>,
        key_columns: Vec<String>,
    },
    /// Update rows matching the predicate
    Update {
        relation: String,
        assignments: Vec<(String, Value)>,
        equals: Vec<(String, Value)>,
    },
    /// Delete rows matching the predicate
    Delete {
        relation: String,
        equals: Vec<(String, Value)>,
    },
    /// Create a base table
    CreateTable { schema: TableSchema },
    /// Create a view with a query body
    CreateView { name: String, query: SelectQuery },
    /// Drop a table or view
    DropRelation { name: String },
}

impl Statement {
    /// The relation this statement addresses
    pub fn relation(&self) -> &str {
        match self {
            Statement::Select(query) => &query.relation,
            Statement::Insert { relation, .. }
            | Statement::Upsert { relation, .. }
            | Statement::Update { relation, .. }
            | Statement::Delete { relation, .. } => relation,
            Statement::CreateTable { schema } => schema.name(),
            Statement::CreateView { name, .. } | Statement::DropRelation { name } => name,
        }
    }
}

/// Outcome of a mutating statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteOutcome {
    /// Rows affected
    pub rowcount: u64,
    /// Key values the backend assigned or confirmed, in key-column order
    pub generated_keys: Vec<Value>,
}

/// One relation listed by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMeta {
    /// Relation name
    pub name: String,
    /// Whether the relation is a view
    pub is_view: bool,
}

/// Catalog metadata for one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,
    /// Backend type name, e.g. `VARCHAR(255)`
    pub sql_type: String,
    /// Whether NULL is storable
    pub nullable: bool,
    /// Whether the column is part of the primary key
    pub primary_key: bool,
    /// 1-based position within a composite key
    pub pk_position: Option<u32>,
}

impl ColumnMeta {
    /// A non-key column
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable,
            primary_key: false,
            pk_position: None,
        }
    }

    /// A key column at the given 1-based key position
    pub fn keyed(name: impl Into<String>, sql_type: impl Into<String>, position: u32) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: false,
            primary_key: true,
            pk_position: Some(position),
        }
    }
}

/// Asynchronous execution collaborator.
///
/// Reads go through [`execute`](SqlEngine::execute), mutations through
/// [`execute_write`](SqlEngine::execute_write); the catalog methods back
/// reflection and the render methods produce dialect DDL text for
/// inspection. Implementations own all I/O, pooling, and cancellation;
/// this layer suspends only inside these calls.
pub trait SqlEngine: Send + Sync {
    /// Executes a read and returns the matching rows
    fn execute(&self, statement: &Statement)
        -> impl Future<Output = EngineResult<Vec<Row>>> + Send;

    /// Executes a mutation and reports affected rows and assigned keys
    fn execute_write(
        &self,
        statement: &Statement,
    ) -> impl Future<Output = EngineResult<WriteOutcome>> + Send;

    /// Lists the relations the backend catalog knows
    fn catalog_tables(&self) -> impl Future<Output = EngineResult<Vec<RelationMeta>>> + Send;

    /// Describes one relation's columns
    fn catalog_columns(
        &self,
        relation: &str,
    ) -> impl Future<Output = EngineResult<Vec<ColumnMeta>>> + Send;

    /// Renders dialect DDL text for a schema, for inspection
    fn render_ddl(&self, schema: &TableSchema) -> String;

    /// Renders dialect DROP text for a relation, for inspection
    fn render_drop(&self, relation: &str) -> String;

    /// Whether [`Statement::Upsert`] is executed atomically.
    ///
    /// Engines without a native upsert return false and the table layer
    /// falls back to a read-then-branch sequence, which can race under
    /// concurrent writers.
    fn supports_upsert(&self) -> bool {
        false
    }
}
