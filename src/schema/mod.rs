//! Schema subsystem
//!
//! Translates declarative field descriptors (create path) or live catalog
//! metadata (reflection path) into immutable relation schemas.
//!
//! # Design Principles
//!
//! - Schemas are immutable once built; structural change means re-reflection
//! - Column order and composite-key order are fixed at build time
//! - Descriptor-to-storage mapping is pure and side-effect free

mod builder;
mod descriptor;
mod types;

pub use builder::{SchemaBuilder, TableSchema};
pub use descriptor::TableDescriptor;
pub use types::{map_descriptor, ColumnDef, FieldKind, StorageClass};
