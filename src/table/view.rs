//! Read-only view access
//!
//! A [`View`] wraps a [`Table`] whose schema carries the is-view flag.
//! Reads behave exactly as on a table; mutations are rejected before any
//! engine call. Views come from reflection or from explicit creation with
//! a query body, never from a plain descriptor.

use std::sync::Arc;

use serde_json::Value;

use crate::engine::SqlEngine;
use crate::errors::DbResult;
use crate::filter::FilterSet;
use crate::record::{PkValue, Record, RecordType};
use crate::schema::TableSchema;

use super::Table;

/// Read-only access to a view through an execution engine
#[derive(Debug)]
pub struct View<E> {
    inner: Table<E>,
}

impl<E> Clone for View<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: SqlEngine> View<E> {
    pub(crate) fn new(inner: Table<E>) -> Self {
        debug_assert!(inner.is_view());
        Self { inner }
    }

    /// The view name
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// The view's immutable schema
    pub fn schema(&self) -> &TableSchema {
        self.inner.schema()
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.inner.column_names()
    }

    /// Key columns used for point reads.
    ///
    /// Without a declared key this is the pseudo-key: the first declared
    /// column.
    pub fn pk_columns(&self) -> &[String] {
        self.inner.pk_columns()
    }

    /// Dialect-rendered DDL text, for inspection
    pub fn schema_text(&self) -> &str {
        self.inner.schema_text()
    }

    /// The scoped filters this instance carries
    pub fn filters(&self) -> &FilterSet {
        self.inner.filters()
    }

    /// Binds (or returns the already-bound) structured record type
    pub fn bind_type(&self) -> Arc<RecordType> {
        self.inner.bind_type()
    }

    /// Derives a view scoped by additional equality constraints
    pub fn xtra(&self, constraints: &[(&str, Value)]) -> DbResult<View<E>> {
        Ok(View {
            inner: self.inner.xtra(constraints)?,
        })
    }

    /// Reads rows in this view's scope
    pub async fn select(&self, limit: Option<usize>) -> DbResult<Vec<Record>> {
        self.inner.select(limit).await
    }

    /// Reads rows paired with their (pseudo-)key values
    pub async fn select_with_pk(&self, limit: Option<usize>) -> DbResult<Vec<(PkValue, Record)>> {
        self.inner.select_with_pk(limit).await
    }

    /// Reads the single row addressed by a (pseudo-)key value
    pub async fn get(&self, pk: impl Into<PkValue>) -> DbResult<Record> {
        self.inner.get(pk).await
    }

    /// Reads one row matching the given equality criteria
    pub async fn lookup(&self, criteria: &[(&str, Value)]) -> DbResult<Record> {
        self.inner.lookup(criteria).await
    }

    /// Always fails: views reject mutation before any engine call
    pub async fn insert(&self, rec: &Record) -> DbResult<Record> {
        self.inner.insert(rec).await
    }

    /// Always fails: views reject mutation before any engine call
    pub async fn update(&self, rec: &Record) -> DbResult<Record> {
        self.inner.update(rec).await
    }

    /// Always fails: views reject mutation before any engine call
    pub async fn upsert(&self, rec: &Record) -> DbResult<Record> {
        self.inner.upsert(rec).await
    }

    /// Always fails: views reject mutation before any engine call
    pub async fn delete(&self, pk: impl Into<PkValue>) -> DbResult<()> {
        self.inner.delete(pk).await
    }

    /// Drops the backing view
    pub async fn drop(&self) -> DbResult<()> {
        self.inner.drop().await
    }
}
