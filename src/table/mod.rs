//! # Table CRUD Engine
//!
//! [`Table`] composes a shared immutable schema, the record codec, and a
//! scoped filter set over an execution engine. All backend-touching
//! operations are async; everything else (encoding, key normalization,
//! filter checks) happens synchronously before the first engine call, so
//! malformed input never reaches the backend.
//!
//! Filtered derivatives made with [`Table::xtra`] share the parent's
//! schema and bound record type but own an independent filter set.

mod view;

pub use view::View;

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::debug;

use crate::engine::{EngineError, SelectQuery, SqlEngine, Statement};
use crate::errors::{ColumnValues, DbError, DbResult, SchemaKind, ValidationKind};
use crate::filter::FilterSet;
use crate::record::{self, PkValue, Record, RecordType};
use crate::schema::TableSchema;

/// CRUD access to one relation through an execution engine
#[derive(Debug)]
pub struct Table<E> {
    engine: Arc<E>,
    schema: Arc<TableSchema>,
    ddl: Arc<String>,
    bound: Arc<OnceLock<Arc<RecordType>>>,
    filters: FilterSet,
    select_cap: Option<usize>,
}

impl<E> Clone for Table<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            schema: Arc::clone(&self.schema),
            ddl: Arc::clone(&self.ddl),
            bound: Arc::clone(&self.bound),
            filters: self.filters.clone(),
            select_cap: self.select_cap,
        }
    }
}

impl<E: SqlEngine> Table<E> {
    pub(crate) fn new(
        engine: Arc<E>,
        schema: TableSchema,
        ddl: String,
        select_cap: Option<usize>,
    ) -> Self {
        Self {
            engine,
            schema: Arc::new(schema),
            ddl: Arc::new(ddl),
            bound: Arc::new(OnceLock::new()),
            filters: FilterSet::new(),
            select_cap,
        }
    }

    /// The relation name
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// The relation's immutable schema
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.schema.column_names()
    }

    /// Primary-key column names in fixed order
    pub fn pk_columns(&self) -> &[String] {
        self.schema.pk_columns()
    }

    /// Dialect-rendered DDL text, for inspection
    pub fn schema_text(&self) -> &str {
        &self.ddl
    }

    /// Whether this relation is a view
    pub fn is_view(&self) -> bool {
        self.schema.is_view()
    }

    /// The scoped filters this instance carries
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Binds (or returns the already-bound) structured record type.
    ///
    /// The first call derives the type from the schema; every later call,
    /// from this instance or any filtered derivative, returns the same
    /// type. After binding, all operations yield structured records.
    pub fn bind_type(&self) -> Arc<RecordType> {
        self.bound
            .get_or_init(|| Arc::new(RecordType::derive(&self.schema)))
            .clone()
    }

    fn bound_type(&self) -> Option<&Arc<RecordType>> {
        self.bound.get()
    }

    /// Derives a table scoped by additional equality constraints.
    ///
    /// The derivative shares this table's schema and bound type; its
    /// filter set is the union of this table's and the given constraints.
    pub fn xtra(&self, constraints: &[(&str, Value)]) -> DbResult<Table<E>> {
        for (column, _) in constraints {
            if !self.schema.has_column(column) {
                return Err(DbError::schema(
                    self.name(),
                    SchemaKind::ColumnNotFound {
                        column: column.to_string(),
                    },
                ));
            }
        }
        let filters = self
            .filters
            .compose(constraints.iter().map(|(c, v)| (*c, v.clone())))
            .map_err(|kind| DbError::validation(self.name(), kind))?;
        Ok(Table {
            engine: Arc::clone(&self.engine),
            schema: Arc::clone(&self.schema),
            ddl: Arc::clone(&self.ddl),
            bound: Arc::clone(&self.bound),
            filters,
            select_cap: self.select_cap,
        })
    }

    /// Reads rows in this table's scope.
    ///
    /// An empty result is a valid outcome, not an error.
    pub async fn select(&self, limit: Option<usize>) -> DbResult<Vec<Record>> {
        let rows = self
            .engine
            .execute(&Statement::Select(self.scope_query(Vec::new(), limit.or(self.select_cap))))
            .await
            .map_err(|e| self.engine_failure(e))?;
        debug!(table = self.name(), rows = rows.len(), "select");
        Ok(rows
            .iter()
            .map(|row| record::decode(row, &self.schema, self.bound_type()))
            .collect())
    }

    /// Reads rows paired with their primary-key values
    pub async fn select_with_pk(
        &self,
        limit: Option<usize>,
    ) -> DbResult<Vec<(PkValue, Record)>> {
        let records = self.select(limit).await?;
        records
            .into_iter()
            .map(|rec| {
                let pk = record::extract_pk(&rec, &self.schema)
                    .map_err(|kind| DbError::validation(self.name(), kind))?;
                Ok((pk, rec))
            })
            .collect()
    }

    /// Reads the single row addressed by a primary-key value.
    ///
    /// The key is normalized against the schema's key columns; its arity
    /// must match. The lookup is ANDed with the scoped filters, so a row
    /// outside the scope reads as absent.
    pub async fn get(&self, pk: impl Into<PkValue>) -> DbResult<Record> {
        let pairs = pk
            .into()
            .normalize(&self.schema)
            .map_err(|kind| DbError::validation(self.name(), kind))?;
        let predicate = self.merge_predicate(pairs);
        let rows = self
            .engine
            .execute(&Statement::Select(SelectQuery {
                relation: self.name().to_string(),
                columns: Vec::new(),
                equals: predicate.clone(),
                limit: Some(2),
            }))
            .await
            .map_err(|e| self.engine_failure(e))?;
        match rows.len() {
            0 => Err(DbError::not_found(self.name(), ColumnValues(predicate))),
            1 => Ok(record::decode(&rows[0], &self.schema, self.bound_type())),
            _ => Err(DbError::Backend {
                table: self.name().to_string(),
                detail: "primary-key lookup matched more than one row".into(),
            }),
        }
    }

    /// Reads one row matching the given equality criteria.
    ///
    /// At least one criterion is required and every criterion must name a
    /// schema column. When several rows match, the first row in backend
    /// order is returned; without an explicit ordering that choice is
    /// not deterministic.
    pub async fn lookup(&self, criteria: &[(&str, Value)]) -> DbResult<Record> {
        if criteria.is_empty() {
            return Err(DbError::validation(
                self.name(),
                ValidationKind::EmptyLookup,
            ));
        }
        for (column, _) in criteria {
            if !self.schema.has_column(column) {
                return Err(DbError::schema(
                    self.name(),
                    SchemaKind::ColumnNotFound {
                        column: column.to_string(),
                    },
                ));
            }
        }
        let pairs: Vec<(String, Value)> = criteria
            .iter()
            .map(|(c, v)| (c.to_string(), v.clone()))
            .collect();
        let predicate = self.merge_predicate(pairs);
        let rows = self
            .engine
            .execute(&Statement::Select(SelectQuery {
                relation: self.name().to_string(),
                columns: Vec::new(),
                equals: predicate.clone(),
                limit: Some(1),
            }))
            .await
            .map_err(|e| self.engine_failure(e))?;
        match rows.first() {
            Some(row) => Ok(record::decode(row, &self.schema, self.bound_type())),
            None => Err(DbError::not_found(self.name(), ColumnValues(predicate))),
        }
    }

    /// Inserts a record and returns it re-read from the backend, with
    /// generated keys and defaulted columns populated.
    pub async fn insert(&self, rec: &Record) -> DbResult<Record> {
        self.reject_view("insert")?;
        let payload = self.merge_write_payload(record::encode(rec, &self.schema))?;
        let payload_pk = self.payload_pk(&payload);
        let outcome = self
            .engine
            .execute_write(&Statement::Insert {
                relation: self.name().to_string(),
                values: payload,
            })
            .await
            .map_err(|e| self.engine_failure(e))?;
        debug!(table = self.name(), "insert");
        let pk = match payload_pk {
            Some(pk) => pk,
            None => self.generated_pk(outcome.generated_keys)?,
        };
        self.get(pk).await
    }

    /// Updates the row addressed by the record's primary key and returns
    /// the freshly read row.
    pub async fn update(&self, rec: &Record) -> DbResult<Record> {
        self.reject_view("update")?;
        let pk = record::extract_pk(rec, &self.schema)
            .map_err(|kind| DbError::validation(self.name(), kind))?;
        let payload = self.check_filter_agreement(record::encode(rec, &self.schema))?;
        let pairs = pk
            .normalize(&self.schema)
            .map_err(|kind| DbError::validation(self.name(), kind))?;
        let assignments: Vec<(String, Value)> = payload
            .into_iter()
            .filter(|(column, _)| !self.schema.pk_columns().contains(column))
            .collect();
        let predicate = self.merge_predicate(pairs);
        let outcome = self
            .engine
            .execute_write(&Statement::Update {
                relation: self.name().to_string(),
                assignments,
                equals: predicate.clone(),
            })
            .await
            .map_err(|e| self.engine_failure(e))?;
        debug!(table = self.name(), rows = outcome.rowcount, "update");
        if outcome.rowcount == 0 {
            return Err(DbError::not_found(self.name(), ColumnValues(predicate)));
        }
        self.get(pk).await
    }

    /// Inserts the record, or updates it when a row with its primary key
    /// already exists.
    ///
    /// With an engine-native upsert the operation is atomic. Otherwise it
    /// falls back to a read-then-branch sequence that can race with
    /// concurrent writers targeting the same key: the losing writer
    /// surfaces the backend's constraint or not-found error instead of
    /// retrying.
    pub async fn upsert(&self, rec: &Record) -> DbResult<Record> {
        self.reject_view("upsert")?;
        let pk = match record::extract_pk(rec, &self.schema) {
            Ok(pk) => pk,
            // No usable key, so there is no row to update.
            Err(_) => return self.insert(rec).await,
        };
        if self.engine.supports_upsert() {
            let payload = self.merge_write_payload(record::encode(rec, &self.schema))?;
            self.engine
                .execute_write(&Statement::Upsert {
                    relation: self.name().to_string(),
                    values: payload,
                    key_columns: self.schema.pk_columns().to_vec(),
                })
                .await
                .map_err(|e| self.engine_failure(e))?;
            debug!(table = self.name(), "upsert");
            return self.get(pk).await;
        }
        match self.get(pk).await {
            Ok(_) => self.update(rec).await,
            Err(DbError::NotFound { .. }) => self.insert(rec).await,
            Err(other) => Err(other),
        }
    }

    /// Deletes the row addressed by a primary-key value
    pub async fn delete(&self, pk: impl Into<PkValue>) -> DbResult<()> {
        self.reject_view("delete")?;
        let pairs = pk
            .into()
            .normalize(&self.schema)
            .map_err(|kind| DbError::validation(self.name(), kind))?;
        let predicate = self.merge_predicate(pairs);
        let outcome = self
            .engine
            .execute_write(&Statement::Delete {
                relation: self.name().to_string(),
                equals: predicate.clone(),
            })
            .await
            .map_err(|e| self.engine_failure(e))?;
        debug!(table = self.name(), rows = outcome.rowcount, "delete");
        if outcome.rowcount == 0 {
            return Err(DbError::not_found(self.name(), ColumnValues(predicate)));
        }
        Ok(())
    }

    /// Drops the backing relation.
    ///
    /// The instance is inert afterwards; further operations surface
    /// whatever the backend reports for a missing relation.
    pub async fn drop(&self) -> DbResult<()> {
        self.engine
            .execute_write(&Statement::DropRelation {
                name: self.name().to_string(),
            })
            .await
            .map_err(|e| self.engine_failure(e))?;
        debug!(table = self.name(), "drop");
        Ok(())
    }

    fn scope_query(&self, extra: Vec<(String, Value)>, limit: Option<usize>) -> SelectQuery {
        SelectQuery {
            relation: self.name().to_string(),
            columns: Vec::new(),
            equals: self.merge_predicate(extra),
            limit,
        }
    }

    /// ANDs the scoped filters onto a predicate, skipping pairs already
    /// present verbatim
    fn merge_predicate(&self, mut base: Vec<(String, Value)>) -> Vec<(String, Value)> {
        for (column, value) in self.filters.pairs() {
            if !base.iter().any(|(c, v)| c == column && v == value) {
                base.push((column.clone(), value.clone()));
            }
        }
        base
    }

    /// Merges fixed filter values into a write payload; a payload value
    /// disagreeing with a fixed value is rejected, never overwritten
    fn merge_write_payload(
        &self,
        mut payload: Vec<(String, Value)>,
    ) -> DbResult<Vec<(String, Value)>> {
        for (column, fixed) in self.filters.pairs() {
            match payload.iter().find(|(c, _)| c == column) {
                Some((_, supplied)) if supplied == fixed => {}
                Some((_, supplied)) => {
                    return Err(DbError::validation(
                        self.name(),
                        ValidationKind::FilterViolation {
                            column: column.clone(),
                            fixed: fixed.clone(),
                            supplied: supplied.clone(),
                        },
                    ));
                }
                None => payload.push((column.clone(), fixed.clone())),
            }
        }
        Ok(payload)
    }

    /// Rejects payload values that disagree with fixed filter values,
    /// without merging absent ones (update semantics)
    fn check_filter_agreement(
        &self,
        payload: Vec<(String, Value)>,
    ) -> DbResult<Vec<(String, Value)>> {
        for (column, fixed) in self.filters.pairs() {
            if let Some((_, supplied)) = payload.iter().find(|(c, _)| c == column) {
                if supplied != fixed {
                    return Err(DbError::validation(
                        self.name(),
                        ValidationKind::FilterViolation {
                            column: column.clone(),
                            fixed: fixed.clone(),
                            supplied: supplied.clone(),
                        },
                    ));
                }
            }
        }
        Ok(payload)
    }

    /// The primary key carried by a write payload, when complete
    fn payload_pk(&self, payload: &[(String, Value)]) -> Option<PkValue> {
        let columns = self.schema.pk_columns();
        if columns.is_empty() {
            return None;
        }
        let mut values = Vec::with_capacity(columns.len());
        for column in columns {
            let value = payload
                .iter()
                .find(|(c, _)| c == column)
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_null())?;
            values.push(value);
        }
        Some(if values.len() == 1 {
            PkValue::Scalar(values.remove(0))
        } else {
            PkValue::Composite(values)
        })
    }

    /// Builds the key for the re-read after an insert from the keys the
    /// backend reported
    fn generated_pk(&self, mut keys: Vec<Value>) -> DbResult<PkValue> {
        let expected = self.schema.pk_columns().len();
        if keys.len() != expected {
            return Err(DbError::Backend {
                table: self.name().to_string(),
                detail: format!(
                    "backend reported {} generated key value(s), expected {}",
                    keys.len(),
                    expected
                ),
            });
        }
        Ok(if expected == 1 {
            PkValue::Scalar(keys.remove(0))
        } else {
            PkValue::Composite(keys)
        })
    }

    fn reject_view(&self, operation: &'static str) -> DbResult<()> {
        if self.schema.is_view() {
            return Err(DbError::InvalidOperation {
                operation,
                target: self.name().to_string(),
            });
        }
        Ok(())
    }

    /// Re-classifies an engine failure for callers
    fn engine_failure(&self, err: EngineError) -> DbError {
        match err {
            EngineError::Connection(detail) => DbError::Connection(detail),
            EngineError::Constraint { kind, detail } => DbError::Integrity {
                table: self.name().to_string(),
                kind,
                detail,
            },
            EngineError::UnknownRelation(name) => DbError::Backend {
                table: self.name().to_string(),
                detail: format!("unknown relation '{name}'"),
            },
            EngineError::Other(detail) => DbError::Backend {
                table: self.name().to_string(),
                detail,
            },
        }
    }
}
