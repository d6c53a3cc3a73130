//! # Reflection Cache
//!
//! Name-keyed registries of hydrated [`Table`] and [`View`] instances,
//! one namespace each. Population is asynchronous (create or reflect);
//! lookup is synchronous and a miss is a distinct usage error telling the
//! caller to reflect first, never a data error. Re-populating a name
//! replaces the entry wholesale; concurrent population is last-writer-wins.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::errors::{DbError, DbResult, Namespace};
use crate::table::{Table, View};

/// Session-lived registries of reflected relations
pub struct ReflectionCache<E> {
    tables: RwLock<HashMap<String, Arc<Table<E>>>>,
    views: RwLock<HashMap<String, Arc<View<E>>>>,
}

impl<E> Default for ReflectionCache<E> {
    fn default() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            views: RwLock::new(HashMap::new()),
        }
    }
}

impl<E> ReflectionCache<E> {
    /// An empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous lookup in the table namespace
    pub fn table(&self, name: &str) -> DbResult<Arc<Table<E>>> {
        self.tables
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::NotCached {
                namespace: Namespace::Tables,
                name: name.to_string(),
            })
    }

    /// Synchronous lookup in the view namespace
    pub fn view(&self, name: &str) -> DbResult<Arc<View<E>>> {
        self.views
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::NotCached {
                namespace: Namespace::Views,
                name: name.to_string(),
            })
    }

    /// Registers a table under its name, replacing any previous entry
    pub fn insert_table(&self, name: &str, table: Arc<Table<E>>) {
        self.tables
            .write()
            .unwrap()
            .insert(name.to_string(), table);
    }

    /// Registers a view under its name, replacing any previous entry
    pub fn insert_view(&self, name: &str, view: Arc<View<E>>) {
        self.views.write().unwrap().insert(name.to_string(), view);
    }

    /// Evicts a table entry
    pub fn remove_table(&self, name: &str) -> Option<Arc<Table<E>>> {
        self.tables.write().unwrap().remove(name)
    }

    /// Evicts a view entry
    pub fn remove_view(&self, name: &str) -> Option<Arc<View<E>>> {
        self.views.write().unwrap().remove(name)
    }

    /// Cached table names, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Cached view names, sorted
    pub fn view_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.views.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}
