//! Row/record conversion
//!
//! Decoding restricts a raw row to the schema's columns and produces the
//! table's current representation; encoding goes the other way and is what
//! write paths send to the backend. Both directions ignore unknown names
//! instead of erroring: rows may carry extra columns, callers may pass
//! extra keys.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::ValidationKind;
use crate::schema::TableSchema;

use super::{PkValue, Record, RecordType, Row, StructuredRecord};

/// Converts a raw row into a record.
///
/// Without a bound type the result is a loose mapping of the schema
/// columns present in the row. With one, it is an instance of the bound
/// type with absent fields defaulted to null.
pub fn decode(row: &Row, schema: &TableSchema, bound: Option<&Arc<RecordType>>) -> Record {
    match bound {
        Some(ty) => Record::Structured(StructuredRecord::from_row(Arc::clone(ty), row)),
        None => {
            let mut map = Map::new();
            for column in schema.columns() {
                if let Some(value) = row.get(&column.name) {
                    map.insert(column.name.clone(), value.clone());
                }
            }
            Record::Mapping(map)
        }
    }
}

/// Converts a record into a column/value payload restricted to schema
/// columns, in column order.
///
/// Keys outside the schema are ignored. For a structured record, null
/// fields are treated as unset and omitted, so backend-assigned keys and
/// defaulted columns are left to the backend.
pub fn encode(record: &Record, schema: &TableSchema) -> Vec<(String, Value)> {
    let mut payload = Vec::new();
    for column in schema.columns() {
        match record {
            Record::Mapping(map) => {
                if let Some(value) = map.get(&column.name) {
                    payload.push((column.name.clone(), value.clone()));
                }
            }
            Record::Structured(rec) => {
                if let Some(value) = rec.get(&column.name) {
                    if !value.is_null() {
                        payload.push((column.name.clone(), value.clone()));
                    }
                }
            }
        }
    }
    payload
}

/// Reads the primary-key value(s) from a record in fixed key order.
///
/// Absent or null key columns make the key unusable for addressing a row.
pub fn extract_pk(record: &Record, schema: &TableSchema) -> Result<PkValue, ValidationKind> {
    let columns = schema.pk_columns();
    let mut values = Vec::with_capacity(columns.len());
    let mut missing = Vec::new();
    for column in columns {
        match record.get(column) {
            Some(value) if !value.is_null() => values.push(value.clone()),
            _ => missing.push(column.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(ValidationKind::MissingPk { columns: missing });
    }
    if values.len() == 1 {
        Ok(PkValue::Scalar(values.remove(0)))
    } else {
        Ok(PkValue::Composite(values))
    }
}
