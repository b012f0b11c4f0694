//! Bounded cache of recently handled records.

use crate::utils::{now_utc, Timestamp};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

/// One remembered record.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// What kind of record this was (a stage name, `job`, `execution`).
    pub kind: String,
    /// The record's key or message id.
    pub key: String,
    /// Truncated payload digest, enough to spot duplicates by eye.
    pub fingerprint: String,
    /// When the record passed through.
    pub recorded_at: Timestamp,
}

/// A capacity-bounded deque of recently handled records.
///
/// Oldest entries are evicted first. The cache is observational only;
/// no pipeline decision reads it.
#[derive(Debug)]
pub struct RecentCache {
    entries: Mutex<VecDeque<CacheEntry>>,
    capacity: usize,
}

impl RecentCache {
    /// Creates a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Remembers one handled record.
    pub fn record(&self, kind: &str, key: &str, payload: &str) {
        let entry = CacheEntry {
            kind: kind.to_string(),
            key: key.to_string(),
            fingerprint: fingerprint(payload),
            recorded_at: now_utc(),
        };
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// The newest entries, newest first, at most `limit`.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<CacheEntry> {
        self.entries
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of remembered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing has been remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Hex digest of the first 16 bytes of the payload's SHA-256.
fn fingerprint(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}
