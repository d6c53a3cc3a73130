//! tablekit - schema-driven asynchronous data access over relational backends
//!
//! Declarative field descriptors (or live catalog metadata) become
//! immutable relation schemas; a uniform CRUD contract runs over them
//! through a pluggable execution engine, with loose-mapping and
//! structured-record output modes, composable scoped filters, and a
//! reflection cache for synchronous name lookup after async hydration.

pub mod cache;
pub mod database;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod record;
pub mod schema;
pub mod table;

pub use cache::ReflectionCache;
pub use database::{Database, DatabaseOptions};
pub use engine::{MemoryEngine, SelectQuery, SqlEngine, Statement};
pub use errors::{DbError, DbResult};
pub use filter::FilterSet;
pub use record::{PkValue, Record, RecordType, Row};
pub use schema::{FieldKind, SchemaBuilder, TableDescriptor, TableSchema};
pub use table::{Table, View};
