//! Schema construction from descriptors and catalog metadata
//!
//! Both paths produce an immutable [`TableSchema`]: the create path maps a
//! [`TableDescriptor`] field by field, the reflection path maps live
//! catalog column metadata for relations this system did not create.
//! Structural change never mutates a schema; re-reflection builds a new one.

use serde::{Deserialize, Serialize};

use crate::engine::ColumnMeta;
use crate::errors::{DbError, DbResult, SchemaKind, ValidationKind};

use super::descriptor::TableDescriptor;
use super::types::{map_descriptor, ColumnDef, StorageClass};

/// Immutable schema of a table or view
///
/// Column order is declaration order; the primary-key column list keeps its
/// own declared order, which matters for composite keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Vec<String>,
    is_view: bool,
}

impl TableSchema {
    /// The relation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Looks up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the schema declares the named column
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Primary-key column names in fixed declared order.
    ///
    /// For a view without a declared key this is the pseudo-key (the first
    /// declared column).
    pub fn pk_columns(&self) -> &[String] {
        &self.primary_key
    }

    /// Whether this schema describes a view
    pub fn is_view(&self) -> bool {
        self.is_view
    }

    /// The auto-assigned key column, if the table has one.
    ///
    /// A single-column INTEGER primary key is backend-assigned when the
    /// insert payload omits it.
    pub fn auto_pk(&self) -> Option<&ColumnDef> {
        if self.primary_key.len() != 1 {
            return None;
        }
        self.column(&self.primary_key[0])
            .filter(|c| c.primary_key && c.class == StorageClass::Integer)
    }
}

/// Builds [`TableSchema`] values from descriptors or reflected metadata
pub struct SchemaBuilder;

impl SchemaBuilder {
    /// Builds a schema from a declarative descriptor.
    ///
    /// Fields are mapped in declaration order. The primary key defaults to
    /// `{"id"}` when none is declared; every key column must name a
    /// declared field. Key columns are stored not-null regardless of an
    /// optional wrapper.
    pub fn from_descriptor(descriptor: &TableDescriptor) -> DbResult<TableSchema> {
        let table = descriptor.name();
        if descriptor.fields().is_empty() {
            return Err(DbError::validation(table, ValidationKind::NoFields));
        }

        let mut columns: Vec<ColumnDef> = Vec::with_capacity(descriptor.fields().len());
        for (name, kind) in descriptor.fields() {
            if columns.iter().any(|c| &c.name == name) {
                return Err(DbError::validation(
                    table,
                    ValidationKind::DuplicateColumn {
                        column: name.clone(),
                    },
                ));
            }
            let (class, nullable) = map_descriptor(kind).map_err(|declared| {
                DbError::schema(
                    table,
                    SchemaKind::UnsupportedType {
                        column: name.clone(),
                        declared,
                    },
                )
            })?;
            columns.push(ColumnDef::new(name.clone(), class, nullable));
        }

        let primary_key: Vec<String> = match descriptor.declared_primary_key() {
            Some(declared) if !declared.is_empty() => declared.to_vec(),
            _ => vec!["id".to_string()],
        };
        for key in &primary_key {
            let column = columns.iter_mut().find(|c| &c.name == key).ok_or_else(|| {
                DbError::schema(table, SchemaKind::PkNotFound { column: key.clone() })
            })?;
            column.primary_key = true;
            column.nullable = false;
        }

        Ok(TableSchema {
            name: table.to_string(),
            columns,
            primary_key,
            is_view: false,
        })
    }

    /// Builds a schema from live catalog metadata.
    ///
    /// Key order follows the catalog's key positions when present,
    /// otherwise column order. A view with no declared key gets its first
    /// column as a pseudo-key so point reads stay addressable.
    pub fn from_reflection(
        relation: &str,
        catalog: &[ColumnMeta],
        is_view: bool,
    ) -> DbResult<TableSchema> {
        if catalog.is_empty() {
            return Err(DbError::validation(relation, ValidationKind::NoFields));
        }

        let mut columns: Vec<ColumnDef> = Vec::with_capacity(catalog.len());
        for meta in catalog {
            if columns.iter().any(|c| c.name == meta.name) {
                return Err(DbError::validation(
                    relation,
                    ValidationKind::DuplicateColumn {
                        column: meta.name.clone(),
                    },
                ));
            }
            let class = StorageClass::from_sql_type(&meta.sql_type).ok_or_else(|| {
                DbError::schema(
                    relation,
                    SchemaKind::UnsupportedType {
                        column: meta.name.clone(),
                        declared: meta.sql_type.clone(),
                    },
                )
            })?;
            columns.push(ColumnDef {
                name: meta.name.clone(),
                class,
                nullable: meta.nullable && !meta.primary_key,
                primary_key: meta.primary_key,
            });
        }

        let mut keyed: Vec<&ColumnMeta> = catalog.iter().filter(|m| m.primary_key).collect();
        keyed.sort_by_key(|m| m.pk_position.unwrap_or(u32::MAX));
        let mut primary_key: Vec<String> = keyed.into_iter().map(|m| m.name.clone()).collect();

        if primary_key.is_empty() && is_view {
            // Views rarely declare keys; the first column stands in.
            primary_key.push(columns[0].name.clone());
        }

        Ok(TableSchema {
            name: relation.to_string(),
            columns,
            primary_key,
            is_view,
        })
    }
}
