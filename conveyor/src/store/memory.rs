//! In-memory state store backend.

use super::{StateStore, Table};
use crate::errors::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// A process-local [`StateStore`] holding everything in a mutex-guarded
/// map. Tables are created lazily on first write.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, HashMap<String, Value>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items in one table.
    #[must_use]
    pub fn table_len(&self, table: Table) -> usize {
        self.tables.lock().get(&table).map_or(0, HashMap::len)
    }

    /// Returns true if no table holds any item.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.lock().values().all(HashMap::is_empty)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn put(&self, table: Table, key: &str, value: Value) -> Result<(), StoreError> {
        self.tables
            .lock()
            .entry(table)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, table: Table, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .tables
            .lock()
            .get(&table)
            .and_then(|items| items.get(key).cloned()))
    }

    async fn scan(&self, table: Table) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .tables
            .lock()
            .get(&table)
            .map_or_else(Vec::new, |items| items.values().cloned().collect()))
    }
}
