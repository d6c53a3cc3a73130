//! # Database Facade
//!
//! The entry point tying the subsystems together: it owns the execution
//! engine and the reflection cache, builds schemas on the create path,
//! hydrates tables and views from catalog metadata on the reflection
//! path, and hands out cached instances for synchronous name lookup.

use std::sync::Arc;

use tracing::debug;

use crate::cache::ReflectionCache;
use crate::engine::{EngineError, SelectQuery, SqlEngine, Statement};
use crate::errors::{DbError, DbResult, SchemaKind};
use crate::schema::{SchemaBuilder, TableDescriptor, TableSchema};
use crate::table::{Table, View};

/// Tunables for a database handle
#[derive(Debug, Clone, Default)]
pub struct DatabaseOptions {
    /// Row cap applied to `select` calls that pass no limit; `None`
    /// leaves such reads unbounded
    pub select_cap: Option<usize>,
}

/// A database session: engine, cache, and the create/reflect paths
pub struct Database<E> {
    engine: Arc<E>,
    cache: ReflectionCache<E>,
    options: DatabaseOptions,
}

impl<E: SqlEngine> Database<E> {
    /// A database handle over the given engine.
    ///
    /// Accepts the engine by value or already shared, so several handles
    /// can sit on one backend.
    pub fn new(engine: impl Into<Arc<E>>) -> Self {
        Self::with_options(engine, DatabaseOptions::default())
    }

    /// A database handle with explicit options
    pub fn with_options(engine: impl Into<Arc<E>>, options: DatabaseOptions) -> Self {
        Self {
            engine: engine.into(),
            cache: ReflectionCache::new(),
            options,
        }
    }

    /// The underlying execution engine
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Creates a table from a descriptor, registers it, and returns it.
    ///
    /// The cache entry is written only after the backend reports success,
    /// so a cancelled or failed create leaves no partial registration.
    pub async fn create_table(&self, descriptor: &TableDescriptor) -> DbResult<Arc<Table<E>>> {
        let schema = SchemaBuilder::from_descriptor(descriptor)?;
        let ddl = self.engine.render_ddl(&schema);
        self.engine
            .execute_write(&Statement::CreateTable {
                schema: schema.clone(),
            })
            .await
            .map_err(|e| self.engine_failure(schema.name(), e))?;
        debug!(table = schema.name(), "create table");
        let table = Arc::new(self.hydrate(schema, ddl));
        self.cache.insert_table(table.name(), Arc::clone(&table));
        Ok(table)
    }

    /// Creates a view with a query body, registers it, and returns it.
    ///
    /// The view's schema is reflected back from the catalog after
    /// creation, so its columns are exactly what the backend derived.
    pub async fn create_view(&self, name: &str, query: SelectQuery) -> DbResult<Arc<View<E>>> {
        self.engine
            .execute_write(&Statement::CreateView {
                name: name.to_string(),
                query,
            })
            .await
            .map_err(|e| self.engine_failure(name, e))?;
        debug!(view = name, "create view");
        let view = Arc::new(self.build_view(name).await?);
        self.cache.insert_view(name, Arc::clone(&view));
        Ok(view)
    }

    /// Reflects one base table from the catalog, replacing any cached
    /// entry of the same name
    pub async fn reflect_table(&self, name: &str) -> DbResult<Arc<Table<E>>> {
        let meta = self.relation_meta(name).await?;
        if meta.is_view {
            return Err(DbError::InvalidOperation {
                operation: "reflect_table",
                target: name.to_string(),
            });
        }
        let table = Arc::new(self.build_table(name).await?);
        self.cache.insert_table(name, Arc::clone(&table));
        Ok(table)
    }

    /// Reflects one view from the catalog, replacing any cached entry of
    /// the same name
    pub async fn reflect_view(&self, name: &str) -> DbResult<Arc<View<E>>> {
        let meta = self.relation_meta(name).await?;
        if !meta.is_view {
            return Err(DbError::InvalidOperation {
                operation: "reflect_view",
                target: name.to_string(),
            });
        }
        let view = Arc::new(self.build_view(name).await?);
        self.cache.insert_view(name, Arc::clone(&view));
        Ok(view)
    }

    /// Reflects every relation the catalog lists, populating both
    /// namespaces. Existing entries are replaced, never merged.
    pub async fn reflect_all(&self) -> DbResult<()> {
        let relations = self
            .engine
            .catalog_tables()
            .await
            .map_err(|e| self.engine_failure("<catalog>", e))?;
        debug!(relations = relations.len(), "bulk reflection");
        for meta in relations {
            if meta.is_view {
                let view = Arc::new(self.build_view(&meta.name).await?);
                self.cache.insert_view(&meta.name, view);
            } else {
                let table = Arc::new(self.build_table(&meta.name).await?);
                self.cache.insert_table(&meta.name, table);
            }
        }
        Ok(())
    }

    /// Synchronous lookup of a cached table
    pub fn table(&self, name: &str) -> DbResult<Arc<Table<E>>> {
        self.cache.table(name)
    }

    /// Synchronous lookup of a cached view
    pub fn view(&self, name: &str) -> DbResult<Arc<View<E>>> {
        self.cache.view(name)
    }

    /// Cached table names, sorted
    pub fn table_names(&self) -> Vec<String> {
        self.cache.table_names()
    }

    /// Cached view names, sorted
    pub fn view_names(&self) -> Vec<String> {
        self.cache.view_names()
    }

    /// Drops a cached table's backing relation and evicts it
    pub async fn drop_table(&self, name: &str) -> DbResult<()> {
        let table = self.cache.table(name)?;
        Table::drop(&table).await?;
        self.cache.remove_table(name);
        Ok(())
    }

    /// Drops a cached view's backing relation and evicts it
    pub async fn drop_view(&self, name: &str) -> DbResult<()> {
        let view = self.cache.view(name)?;
        View::drop(&view).await?;
        self.cache.remove_view(name);
        Ok(())
    }

    async fn build_table(&self, name: &str) -> DbResult<Table<E>> {
        let columns = self
            .engine
            .catalog_columns(name)
            .await
            .map_err(|e| self.engine_failure(name, e))?;
        let schema = SchemaBuilder::from_reflection(name, &columns, false)?;
        let ddl = self.engine.render_ddl(&schema);
        Ok(self.hydrate(schema, ddl))
    }

    async fn build_view(&self, name: &str) -> DbResult<View<E>> {
        let columns = self
            .engine
            .catalog_columns(name)
            .await
            .map_err(|e| self.engine_failure(name, e))?;
        let schema = SchemaBuilder::from_reflection(name, &columns, true)?;
        let ddl = self.engine.render_ddl(&schema);
        Ok(View::new(self.hydrate(schema, ddl)))
    }

    async fn relation_meta(&self, name: &str) -> DbResult<crate::engine::RelationMeta> {
        let relations = self
            .engine
            .catalog_tables()
            .await
            .map_err(|e| self.engine_failure(name, e))?;
        relations
            .into_iter()
            .find(|meta| meta.name == name)
            .ok_or_else(|| DbError::schema(name, SchemaKind::RelationNotFound))
    }

    fn hydrate(&self, schema: TableSchema, ddl: String) -> Table<E> {
        Table::new(
            Arc::clone(&self.engine),
            schema,
            ddl,
            self.options.select_cap,
        )
    }

    fn engine_failure(&self, relation: &str, err: EngineError) -> DbError {
        match err {
            EngineError::Connection(detail) => DbError::Connection(detail),
            EngineError::Constraint { kind, detail } => DbError::Integrity {
                table: relation.to_string(),
                kind,
                detail,
            },
            EngineError::UnknownRelation(_) => {
                DbError::schema(relation, SchemaKind::RelationNotFound)
            }
            EngineError::Other(detail) => DbError::Backend {
                table: relation.to_string(),
                detail,
            },
        }
    }
}
