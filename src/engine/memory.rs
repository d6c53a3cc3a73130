//! In-memory execution engine
//!
//! A complete [`SqlEngine`] over process-local state, in the mold of an
//! embedded backend: relations are row vectors behind an `RwLock`,
//! single-column integer keys are auto-assigned, key uniqueness is
//! enforced, and absent not-null TIMESTAMP columns are filled with the
//! current UTC time the way a column default would be. Used by the crate's
//! own tests and by downstream code that wants a backend-free harness; in
//! production this is replaced by an engine that renders and executes real
//! SQL.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::Utc;
use serde_json::Value;

use crate::errors::ConstraintKind;
use crate::record::Row;
use crate::schema::{SchemaBuilder, StorageClass, TableSchema};

use super::{
    ColumnMeta, EngineError, EngineResult, RelationMeta, SelectQuery, SqlEngine, Statement,
    WriteOutcome,
};

/// One stored relation: a base table, or a view over another relation
#[derive(Debug, Clone)]
struct MemRelation {
    schema: TableSchema,
    /// The query body when this relation is a view
    query: Option<SelectQuery>,
    rows: Vec<Row>,
    next_key: i64,
}

impl MemRelation {
    fn table(schema: TableSchema) -> Self {
        Self {
            schema,
            query: None,
            rows: Vec::new(),
            next_key: 1,
        }
    }

    /// Key values of a row, in key-column order, when all are present
    fn key_of(&self, row: &Row) -> Option<Vec<Value>> {
        let columns = self.schema.pk_columns();
        if columns.is_empty() {
            return None;
        }
        let mut key = Vec::with_capacity(columns.len());
        for column in columns {
            match row.get(column) {
                Some(value) if !value.is_null() => key.push(value.clone()),
                _ => return None,
            }
        }
        Some(key)
    }

    fn insert_row(&mut self, values: &[(String, Value)]) -> EngineResult<WriteOutcome> {
        let mut row = Row::new();
        for (column, value) in values {
            row.insert(column.clone(), value.clone());
        }

        if let Some(auto) = self.schema.auto_pk() {
            let assigned = match row.get(&auto.name) {
                Some(value) if !value.is_null() => value.as_i64(),
                _ => {
                    let key = self.next_key;
                    row.insert(auto.name.clone(), Value::from(key));
                    Some(key)
                }
            };
            if let Some(key) = assigned {
                self.next_key = self.next_key.max(key + 1);
            }
        }

        // Column-default behavior: absent not-null timestamps get "now".
        for column in self.schema.columns() {
            if column.class == StorageClass::Timestamp
                && !column.nullable
                && !row.contains_key(&column.name)
            {
                row.insert(column.name.clone(), Value::from(Utc::now().to_rfc3339()));
            }
        }

        if let Some(key) = self.key_of(&row) {
            if self.rows.iter().any(|r| self.key_of(r).as_ref() == Some(&key)) {
                return Err(EngineError::Constraint {
                    kind: ConstraintKind::PrimaryKey,
                    detail: format!(
                        "duplicate key for '{}': {:?}",
                        self.schema.name(),
                        key
                    ),
                });
            }
        }

        let generated_keys = self.key_of(&row).unwrap_or_default();
        self.rows.push(row);
        Ok(WriteOutcome {
            rowcount: 1,
            generated_keys,
        })
    }
}

fn matches(row: &Row, equals: &[(String, Value)]) -> bool {
    equals
        .iter()
        .all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value)
}

fn project(row: &Row, columns: &[String]) -> Row {
    if columns.is_empty() {
        return row.clone();
    }
    let mut projected = Row::new();
    for column in columns {
        if let Some(value) = row.get(column) {
            projected.insert(column.clone(), value.clone());
        }
    }
    projected
}

/// Resolves a relation to rows, expanding view bodies recursively
fn resolve_rows(map: &HashMap<String, MemRelation>, name: &str) -> EngineResult<Vec<Row>> {
    let relation = map
        .get(name)
        .ok_or_else(|| EngineError::UnknownRelation(name.to_string()))?;
    match &relation.query {
        None => Ok(relation.rows.clone()),
        Some(query) => {
            let base = resolve_rows(map, &query.relation)?;
            let view_columns: Vec<String> = relation
                .schema
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            let mut rows: Vec<Row> = base
                .iter()
                .filter(|row| matches(row, &query.equals))
                .map(|row| project(row, &view_columns))
                .collect();
            if let Some(limit) = query.limit {
                rows.truncate(limit);
            }
            Ok(rows)
        }
    }
}

/// Process-local [`SqlEngine`] implementation
#[derive(Debug, Default)]
pub struct MemoryEngine {
    relations: RwLock<HashMap<String, MemRelation>>,
    calls: AtomicU64,
    unreachable: AtomicBool,
}

impl MemoryEngine {
    /// An engine with an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of execute/catalog calls made against this engine
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Simulates a lost backend: when set, every call fails with a
    /// connection error
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn checkpoint(&self) -> EngineResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(EngineError::Connection("backend marked unreachable".into()));
        }
        Ok(())
    }
}

impl SqlEngine for MemoryEngine {
    async fn execute(&self, statement: &Statement) -> EngineResult<Vec<Row>> {
        self.checkpoint()?;
        let query = match statement {
            Statement::Select(query) => query,
            other => {
                return Err(EngineError::Other(format!(
                    "not a read statement for '{}'",
                    other.relation()
                )))
            }
        };
        let map = self.relations.read().unwrap();
        let mut rows: Vec<Row> = resolve_rows(&map, &query.relation)?
            .iter()
            .filter(|row| matches(row, &query.equals))
            .map(|row| project(row, &query.columns))
            .collect();
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn execute_write(&self, statement: &Statement) -> EngineResult<WriteOutcome> {
        self.checkpoint()?;
        let mut map = self.relations.write().unwrap();
        match statement {
            Statement::Insert { relation, values } => {
                let rel = map
                    .get_mut(relation)
                    .ok_or_else(|| EngineError::UnknownRelation(relation.clone()))?;
                if rel.query.is_some() {
                    return Err(EngineError::Other(format!(
                        "cannot write to view '{relation}'"
                    )));
                }
                rel.insert_row(values)
            }
            Statement::Upsert {
                relation,
                values,
                key_columns,
            } => {
                let rel = map
                    .get_mut(relation)
                    .ok_or_else(|| EngineError::UnknownRelation(relation.clone()))?;
                if rel.query.is_some() {
                    return Err(EngineError::Other(format!(
                        "cannot write to view '{relation}'"
                    )));
                }
                let key: Option<Vec<(String, Value)>> = key_columns
                    .iter()
                    .map(|column| {
                        values
                            .iter()
                            .find(|(name, value)| name == column && !value.is_null())
                            .cloned()
                    })
                    .collect();
                match key {
                    Some(key) if !key.is_empty() => {
                        let existing = rel.rows.iter_mut().find(|row| matches(row, &key));
                        match existing {
                            Some(row) => {
                                for (column, value) in values {
                                    row.insert(column.clone(), value.clone());
                                }
                                Ok(WriteOutcome {
                                    rowcount: 1,
                                    generated_keys: key.into_iter().map(|(_, v)| v).collect(),
                                })
                            }
                            None => rel.insert_row(values),
                        }
                    }
                    _ => rel.insert_row(values),
                }
            }
            Statement::Update {
                relation,
                assignments,
                equals,
            } => {
                let rel = map
                    .get_mut(relation)
                    .ok_or_else(|| EngineError::UnknownRelation(relation.clone()))?;
                let mut rowcount = 0;
                for row in rel.rows.iter_mut().filter(|row| matches(row, equals)) {
                    for (column, value) in assignments {
                        row.insert(column.clone(), value.clone());
                    }
                    rowcount += 1;
                }
                Ok(WriteOutcome {
                    rowcount,
                    generated_keys: Vec::new(),
                })
            }
            Statement::Delete { relation, equals } => {
                let rel = map
                    .get_mut(relation)
                    .ok_or_else(|| EngineError::UnknownRelation(relation.clone()))?;
                let before = rel.rows.len();
                rel.rows.retain(|row| !matches(row, equals));
                Ok(WriteOutcome {
                    rowcount: (before - rel.rows.len()) as u64,
                    generated_keys: Vec::new(),
                })
            }
            Statement::CreateTable { schema } => {
                let name = schema.name().to_string();
                if map.contains_key(&name) {
                    return Err(EngineError::Other(format!(
                        "relation '{name}' already exists"
                    )));
                }
                map.insert(name, MemRelation::table(schema.clone()));
                Ok(WriteOutcome::default())
            }
            Statement::CreateView { name, query } => {
                if map.contains_key(name) {
                    return Err(EngineError::Other(format!(
                        "relation '{name}' already exists"
                    )));
                }
                let base = map
                    .get(&query.relation)
                    .ok_or_else(|| EngineError::UnknownRelation(query.relation.clone()))?;
                let projected: Vec<&str> = if query.columns.is_empty() {
                    base.schema.column_names()
                } else {
                    query.columns.iter().map(String::as_str).collect()
                };
                let mut catalog = Vec::with_capacity(projected.len());
                for column in projected {
                    let def = base.schema.column(column).ok_or_else(|| {
                        EngineError::Other(format!(
                            "view '{name}' projects unknown column '{column}'"
                        ))
                    })?;
                    catalog.push(ColumnMeta::new(
                        &def.name,
                        def.class.sql_type(),
                        def.nullable,
                    ));
                }
                let schema = SchemaBuilder::from_reflection(name, &catalog, true)
                    .map_err(|e| EngineError::Other(e.to_string()))?;
                map.insert(
                    name.clone(),
                    MemRelation {
                        schema,
                        query: Some(query.clone()),
                        rows: Vec::new(),
                        next_key: 1,
                    },
                );
                Ok(WriteOutcome::default())
            }
            Statement::DropRelation { name } => {
                map.remove(name)
                    .ok_or_else(|| EngineError::UnknownRelation(name.clone()))?;
                Ok(WriteOutcome::default())
            }
            Statement::Select(query) => Err(EngineError::Other(format!(
                "read statement for '{}' sent to execute_write",
                query.relation
            ))),
        }
    }

    async fn catalog_tables(&self) -> EngineResult<Vec<RelationMeta>> {
        self.checkpoint()?;
        let map = self.relations.read().unwrap();
        let mut relations: Vec<RelationMeta> = map
            .values()
            .map(|rel| RelationMeta {
                name: rel.schema.name().to_string(),
                is_view: rel.query.is_some(),
            })
            .collect();
        relations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(relations)
    }

    async fn catalog_columns(&self, relation: &str) -> EngineResult<Vec<ColumnMeta>> {
        self.checkpoint()?;
        let map = self.relations.read().unwrap();
        let rel = map
            .get(relation)
            .ok_or_else(|| EngineError::UnknownRelation(relation.to_string()))?;
        Ok(rel
            .schema
            .columns()
            .iter()
            .map(|column| ColumnMeta {
                name: column.name.clone(),
                sql_type: column.class.sql_type().to_string(),
                nullable: column.nullable,
                primary_key: column.primary_key,
                pk_position: if column.primary_key {
                    rel.schema
                        .pk_columns()
                        .iter()
                        .position(|key| key == &column.name)
                        .map(|i| i as u32 + 1)
                } else {
                    None
                },
            })
            .collect())
    }

    fn render_ddl(&self, schema: &TableSchema) -> String {
        if schema.is_view() {
            return format!(
                "CREATE VIEW {} ({})",
                schema.name(),
                schema.column_names().join(", ")
            );
        }
        let mut parts: Vec<String> = schema
            .columns()
            .iter()
            .map(|column| {
                let mut part = format!("{} {}", column.name, column.class.sql_type());
                if !column.nullable {
                    part.push_str(" NOT NULL");
                }
                part
            })
            .collect();
        if !schema.pk_columns().is_empty() {
            parts.push(format!("PRIMARY KEY ({})", schema.pk_columns().join(", ")));
        }
        format!("CREATE TABLE {} ({})", schema.name(), parts.join(", "))
    }

    fn render_drop(&self, relation: &str) -> String {
        let map = self.relations.read().unwrap();
        let is_view = map.get(relation).is_some_and(|rel| rel.query.is_some());
        if is_view {
            format!("DROP VIEW {relation}")
        } else {
            format!("DROP TABLE {relation}")
        }
    }

    fn supports_upsert(&self) -> bool {
        true
    }
}
