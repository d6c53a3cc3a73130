//! Field descriptors and semantic storage classes
//!
//! A [`FieldKind`] is what callers declare; a [`StorageClass`] is what the
//! relation stores. Mapping between the two is pure: the optional wrapper
//! flips nullability, everything else maps one-to-one. Reflection goes the
//! other way, from catalog type names back to storage classes.

use serde::{Deserialize, Serialize};

/// Declared field type in a table descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// 64-bit signed integer
    Integer,
    /// 64-bit floating point
    Real,
    /// Boolean
    Boolean,
    /// Short text (VARCHAR-class)
    Text,
    /// Long text (TEXT/CLOB-class)
    LongText,
    /// Raw bytes
    Binary,
    /// Nested structured value (JSON-class)
    Structured,
    /// Point in time
    Timestamp,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Nullable wrapper around another kind
    Optional {
        /// The wrapped kind (boxed to allow the wrapper in declarations)
        inner: Box<FieldKind>,
    },
}

impl FieldKind {
    /// Wraps a kind in the optional marker
    pub fn optional(inner: FieldKind) -> Self {
        FieldKind::Optional {
            inner: Box::new(inner),
        }
    }

    /// Returns the descriptor name for error messages
    pub fn descriptor_name(&self) -> String {
        match self {
            FieldKind::Integer => "integer".into(),
            FieldKind::Real => "real".into(),
            FieldKind::Boolean => "boolean".into(),
            FieldKind::Text => "text".into(),
            FieldKind::LongText => "long_text".into(),
            FieldKind::Binary => "binary".into(),
            FieldKind::Structured => "structured".into(),
            FieldKind::Timestamp => "timestamp".into(),
            FieldKind::Date => "date".into(),
            FieldKind::Time => "time".into(),
            FieldKind::Optional { inner } => format!("optional<{}>", inner.descriptor_name()),
        }
    }
}

/// Semantic storage class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    Integer,
    ShortText,
    LongText,
    Real,
    Boolean,
    Binary,
    Structured,
    Timestamp,
    Date,
    Time,
}

impl StorageClass {
    /// Generic SQL type name used when rendering DDL and catalog metadata
    pub fn sql_type(&self) -> &'static str {
        match self {
            StorageClass::Integer => "INTEGER",
            StorageClass::ShortText => "VARCHAR",
            StorageClass::LongText => "TEXT",
            StorageClass::Real => "REAL",
            StorageClass::Boolean => "BOOLEAN",
            StorageClass::Binary => "BLOB",
            StorageClass::Structured => "JSON",
            StorageClass::Timestamp => "TIMESTAMP",
            StorageClass::Date => "DATE",
            StorageClass::Time => "TIME",
        }
    }

    /// Maps a catalog type name back to a storage class.
    ///
    /// Length arguments and case are ignored, so `varchar(255)` and
    /// `VARCHAR` land on the same class. Returns `None` for names with no
    /// mapping; reflection reports those as unsupported.
    pub fn from_sql_type(declared: &str) -> Option<StorageClass> {
        let base = declared
            .split('(')
            .next()
            .unwrap_or(declared)
            .trim()
            .to_ascii_uppercase();
        match base.as_str() {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "SERIAL" | "BIGSERIAL" => {
                Some(StorageClass::Integer)
            }
            "CHAR" | "VARCHAR" | "CHARACTER" | "CHARACTER VARYING" | "STRING" => {
                Some(StorageClass::ShortText)
            }
            "TEXT" | "CLOB" | "LONGTEXT" | "MEDIUMTEXT" => Some(StorageClass::LongText),
            "REAL" | "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" | "NUMERIC" | "DECIMAL" => {
                Some(StorageClass::Real)
            }
            "BOOL" | "BOOLEAN" => Some(StorageClass::Boolean),
            "BLOB" | "BYTEA" | "BINARY" | "VARBINARY" => Some(StorageClass::Binary),
            "JSON" | "JSONB" => Some(StorageClass::Structured),
            "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME" => Some(StorageClass::Timestamp),
            "DATE" => Some(StorageClass::Date),
            "TIME" => Some(StorageClass::Time),
            _ => None,
        }
    }
}

/// Maps a declared kind to its storage class and nullability.
///
/// The optional wrapper yields `nullable = true`; bare kinds are not-null.
/// A doubly-wrapped optional has no storage mapping and is rejected with
/// the offending descriptor name.
pub fn map_descriptor(kind: &FieldKind) -> Result<(StorageClass, bool), String> {
    match kind {
        FieldKind::Optional { inner } => match inner.as_ref() {
            FieldKind::Optional { .. } => Err(kind.descriptor_name()),
            bare => {
                let (class, _) = map_descriptor(bare)?;
                Ok((class, true))
            }
        },
        FieldKind::Integer => Ok((StorageClass::Integer, false)),
        FieldKind::Real => Ok((StorageClass::Real, false)),
        FieldKind::Boolean => Ok((StorageClass::Boolean, false)),
        FieldKind::Text => Ok((StorageClass::ShortText, false)),
        FieldKind::LongText => Ok((StorageClass::LongText, false)),
        FieldKind::Binary => Ok((StorageClass::Binary, false)),
        FieldKind::Structured => Ok((StorageClass::Structured, false)),
        FieldKind::Timestamp => Ok((StorageClass::Timestamp, false)),
        FieldKind::Date => Ok((StorageClass::Date, false)),
        FieldKind::Time => Ok((StorageClass::Time, false)),
    }
}

/// A single column of a table or view schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name, unique within its schema
    pub name: String,
    /// Semantic storage class
    pub class: StorageClass,
    /// Whether NULL is storable
    pub nullable: bool,
    /// Whether the column participates in the primary key
    pub primary_key: bool,
}

impl ColumnDef {
    /// Create a column definition
    pub fn new(name: impl Into<String>, class: StorageClass, nullable: bool) -> Self {
        Self {
            name: name.into(),
            class,
            nullable,
            primary_key: false,
        }
    }
}
