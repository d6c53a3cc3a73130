//! Records and the bound structured-record type
//!
//! Every table starts out returning loose mappings. Binding derives a
//! [`RecordType`] from the schema (one field per column, in column order),
//! after which the table and all of its filtered derivatives return
//! [`StructuredRecord`] instances instead. The two representations share
//! one sum type, [`Record`], so operation signatures stay uniform.

mod codec;
mod pk;

pub use codec::{decode, encode, extract_pk};
pub use pk::PkValue;

use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::schema::TableSchema;

/// A raw backend row: column name to value
pub type Row = Map<String, Value>;

/// One field of a bound record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordField {
    /// Field name, equal to the column name
    pub name: String,
    /// Whether the field may be absent or null (nullable column or
    /// backend-assigned key)
    pub optional: bool,
}

/// Structured record type derived from a schema at bind time.
///
/// This is a runtime field table, not a compile-time type: reflection
/// discovers schemas at runtime, so the bound shape must be derivable at
/// runtime too. Callers wanting real Rust structs go through
/// [`Record::deserialize_into`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordType {
    relation: String,
    fields: Vec<RecordField>,
}

impl RecordType {
    /// Derives the record type for a schema: a field per column, optional
    /// where the column is nullable or is the backend-assigned key.
    pub fn derive(schema: &TableSchema) -> Self {
        let auto = schema.auto_pk().map(|c| c.name.clone());
        let fields = schema
            .columns()
            .iter()
            .map(|c| RecordField {
                name: c.name.clone(),
                optional: c.nullable || auto.as_deref() == Some(c.name.as_str()),
            })
            .collect();
        Self {
            relation: schema.name().to_string(),
            fields,
        }
    }

    /// The relation this type was derived from
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Fields in column order
    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    /// Position of a field by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// An instance of a bound record type: values aligned with the type's
/// field order, absent columns holding null.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRecord {
    ty: Arc<RecordType>,
    values: Vec<Value>,
}

impl StructuredRecord {
    /// Builds an instance from a raw row by field-name match; row columns
    /// without a field are ignored, fields without a row value get null.
    pub fn from_row(ty: Arc<RecordType>, row: &Row) -> Self {
        let values = ty
            .fields()
            .iter()
            .map(|f| row.get(&f.name).cloned().unwrap_or(Value::Null))
            .collect();
        Self { ty, values }
    }

    /// The bound type this record instantiates
    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    /// The value of a field, if the type has it
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.ty.index_of(field).map(|i| &self.values[i])
    }

    /// Sets a field value. Returns false when the type has no such field.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        match self.ty.index_of(field) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    /// Field name/value pairs in field order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.ty
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .zip(self.values.iter())
    }
}

impl Serialize for StructuredRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.entries() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A record in one of the two output representations.
///
/// A table yields `Mapping` until a type is bound, `Structured` ever
/// after; the two never mix for the same table.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Loose column-to-value mapping
    Mapping(Map<String, Value>),
    /// Instance of the table's bound type
    Structured(StructuredRecord),
}

impl Record {
    /// An empty loose mapping
    pub fn new() -> Self {
        Record::Mapping(Map::new())
    }

    /// Whether this record is an instance of a bound type
    pub fn is_structured(&self) -> bool {
        matches!(self, Record::Structured(_))
    }

    /// The value of a column/field
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Record::Mapping(map) => map.get(field),
            Record::Structured(rec) => rec.get(field),
        }
    }

    /// Sets a column/field value. For a structured record a name outside
    /// the bound type is ignored and false is returned.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        match self {
            Record::Mapping(map) => {
                map.insert(field.to_string(), value);
                true
            }
            Record::Structured(rec) => rec.set(field, value),
        }
    }

    /// The record as a JSON object value
    pub fn to_value(&self) -> Value {
        match self {
            Record::Mapping(map) => Value::Object(map.clone()),
            Record::Structured(rec) => {
                let mut map = Map::new();
                for (name, value) in rec.entries() {
                    map.insert(name.to_string(), value.clone());
                }
                Value::Object(map)
            }
        }
    }

    /// Deserializes the record into a caller-defined struct
    pub fn deserialize_into<T>(&self) -> serde_json::Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        serde_json::from_value(self.to_value())
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Record::Mapping(map) => map.serialize(serializer),
            Record::Structured(rec) => rec.serialize(serializer),
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Record::Mapping(map)
    }
}

impl TryFrom<Value> for Record {
    type Error = Value;

    /// Accepts a JSON object; anything else is handed back as the error.
    fn try_from(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(Record::Mapping(map)),
            other => Err(other),
        }
    }
}
