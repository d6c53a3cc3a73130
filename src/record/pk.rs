//! Primary-key values
//!
//! A key is either a scalar or a fixed-order tuple matching the schema's
//! key column order. Normalization pairs the value(s) with the key columns
//! and is where arity mismatches are caught, before any backend call.

use std::fmt;

use serde_json::Value;

use crate::errors::ValidationKind;
use crate::schema::TableSchema;

/// A scalar or composite primary-key value
#[derive(Debug, Clone, PartialEq)]
pub enum PkValue {
    /// Single-column key value
    Scalar(Value),
    /// Multi-column key values in PK column order
    Composite(Vec<Value>),
}

impl PkValue {
    /// Number of values carried
    pub fn arity(&self) -> usize {
        match self {
            PkValue::Scalar(_) => 1,
            PkValue::Composite(values) => values.len(),
        }
    }

    /// The values in key order
    pub fn values(&self) -> Vec<&Value> {
        match self {
            PkValue::Scalar(value) => vec![value],
            PkValue::Composite(values) => values.iter().collect(),
        }
    }

    /// Pairs the key value(s) with the schema's key columns in fixed order.
    ///
    /// The arity must equal the key column count.
    pub fn normalize(&self, schema: &TableSchema) -> Result<Vec<(String, Value)>, ValidationKind> {
        let columns = schema.pk_columns();
        if self.arity() != columns.len() {
            return Err(ValidationKind::BadPkShape {
                expected: columns.len(),
                got: self.arity(),
            });
        }
        Ok(columns
            .iter()
            .cloned()
            .zip(self.values().into_iter().cloned())
            .collect())
    }
}

impl fmt::Display for PkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PkValue::Scalar(value) => write!(f, "{}", value),
            PkValue::Composite(values) => {
                write!(f, "(")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<Value> for PkValue {
    /// A JSON array is taken as a composite key, everything else as scalar.
    fn from(value: Value) -> Self {
        match value {
            Value::Array(values) => PkValue::Composite(values),
            scalar => PkValue::Scalar(scalar),
        }
    }
}

impl From<Vec<Value>> for PkValue {
    fn from(values: Vec<Value>) -> Self {
        PkValue::Composite(values)
    }
}

impl From<i64> for PkValue {
    fn from(value: i64) -> Self {
        PkValue::Scalar(Value::from(value))
    }
}

impl From<i32> for PkValue {
    fn from(value: i32) -> Self {
        PkValue::Scalar(Value::from(value))
    }
}

impl From<&str> for PkValue {
    fn from(value: &str) -> Self {
        PkValue::Scalar(Value::from(value))
    }
}

impl From<String> for PkValue {
    fn from(value: String) -> Self {
        PkValue::Scalar(Value::from(value))
    }
}

impl<A, B> From<(A, B)> for PkValue
where
    A: Into<Value>,
    B: Into<Value>,
{
    fn from((a, b): (A, B)) -> Self {
        PkValue::Composite(vec![a.into(), b.into()])
    }
}

impl<A, B, C> From<(A, B, C)> for PkValue
where
    A: Into<Value>,
    B: Into<Value>,
    C: Into<Value>,
{
    fn from((a, b, c): (A, B, C)) -> Self {
        PkValue::Composite(vec![a.into(), b.into(), c.into()])
    }
}
