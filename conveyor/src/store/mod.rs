//! The shared state store every stage writes through.
//!
//! The store is an external collaborator behind a trait: a keyed item
//! store with point upserts, point reads, and full-table scans. No
//! cross-item transactions. Execution records share the jobs table under
//! their composite keys.

use crate::errors::StoreError;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use std::fmt;

pub mod memory;

pub use memory::MemoryStore;

/// The four logical tables of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Job records and composite-keyed execution records.
    Jobs,
    /// Schedules, keyed by the job they were derived from.
    Schedules,
    /// Adapters, keyed by the schedule they were derived from.
    Adapters,
    /// Terminal queue messages, keyed by the adapter they were derived
    /// from.
    QueueMessages,
}

impl Table {
    /// Wire name of the table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jobs => "jobs",
            Self::Schedules => "schedules",
            Self::Adapters => "adapters",
            Self::QueueMessages => "queue_messages",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A keyed item store with single-item atomic upsert.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Upserts one item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend rejects the write.
    async fn put(&self, table: Table, key: &str, value: Value) -> Result<(), StoreError>;

    /// Reads one item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be read.
    async fn get(&self, table: Table, key: &str) -> Result<Option<Value>, StoreError>;

    /// Returns every item in a table, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot be read.
    async fn scan(&self, table: Table) -> Result<Vec<Value>, StoreError>;
}
