//! Declarative table descriptors
//!
//! The create path starts from a [`TableDescriptor`]: an ordered field
//! list with type kinds plus an optional primary-key declaration. The
//! descriptor is plain data; all validation happens when it is built into
//! a schema.

use serde::{Deserialize, Serialize};

use super::types::FieldKind;

/// Ordered field list describing a table to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    name: String,
    fields: Vec<(String, FieldKind)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primary_key: Option<Vec<String>>,
}

impl TableDescriptor {
    /// Start a descriptor for the named table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            primary_key: None,
        }
    }

    /// Append a field. Declaration order is preserved in the schema.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind));
        self
    }

    /// Declare a single-column primary key
    pub fn primary_key(self, column: impl Into<String>) -> Self {
        self.composite_primary_key([column])
    }

    /// Declare an ordered multi-column primary key
    pub fn composite_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// The table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in declaration order
    pub fn fields(&self) -> &[(String, FieldKind)] {
        &self.fields
    }

    /// The declared primary key, if any was given
    pub fn declared_primary_key(&self) -> Option<&[String]> {
        self.primary_key.as_deref()
    }
}
