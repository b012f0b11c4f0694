//! Per-stage processing counters.

use dashmap::DashMap;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one stage's consumer loop.
#[derive(Debug)]
pub struct StageStats {
    stage: String,
    identity: String,
    processed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl StageStats {
    /// Creates zeroed counters for a stage.
    #[must_use]
    pub fn new(stage: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            identity: identity.into(),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Counts one successfully handled message.
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one handler failure.
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one poison message dropped.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Messages handled successfully so far.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Handler failures so far.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Poison messages dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// The stage-local identity string.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Dictionary representation for the stats surface.
    #[must_use]
    pub fn to_dict(&self) -> Value {
        json!({
            "stage": self.stage,
            "identity": self.identity,
            "processed": self.processed(),
            "failed": self.failed(),
            "dropped": self.dropped(),
        })
    }
}

/// Registry of every stage's counters.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    stages: DashMap<String, Arc<StageStats>>,
}

impl StatsRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counters for a stage, creating them on first use.
    /// The identity of an already-registered stage is kept.
    #[must_use]
    pub fn register(&self, stage: &str, identity: &str) -> Arc<StageStats> {
        Arc::clone(
            &self
                .stages
                .entry(stage.to_string())
                .or_insert_with(|| Arc::new(StageStats::new(stage, identity))),
        )
    }

    /// Counters for one stage, if registered.
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<Arc<StageStats>> {
        self.stages.get(stage).map(|entry| Arc::clone(entry.value()))
    }

    /// Stable-ordered dictionary of every stage's counters.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        let ordered: BTreeMap<String, Value> = self
            .stages
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().to_dict()))
            .collect();
        json!(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = StageStats::new("integration", "integration");
        stats.record_processed();
        stats.record_processed();
        stats.record_failure();
        stats.record_dropped();

        assert_eq!(stats.processed(), 2);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.dropped(), 1);
    }

    #[test]
    fn test_to_dict_shape() {
        let stats = StageStats::new("execution", "runner-42");
        stats.record_processed();

        let dict = stats.to_dict();
        assert_eq!(dict["stage"], "execution");
        assert_eq!(dict["identity"], "runner-42");
        assert_eq!(dict["processed"], 1);
    }

    #[test]
    fn test_registry_returns_same_counters_per_stage() {
        let registry = StatsRegistry::new();
        let a = registry.register("delivery", "delivery");
        let b = registry.register("delivery", "other-identity");
        a.record_processed();

        assert_eq!(b.processed(), 1);
        assert_eq!(b.identity(), "delivery");
    }

    #[test]
    fn test_snapshot_lists_all_stages() {
        let registry = StatsRegistry::new();
        let _ = registry.register("integration", "integration");
        let _ = registry.register("assignment", "worker-7");

        let snapshot = registry.snapshot();
        assert!(snapshot.get("integration").is_some());
        assert!(snapshot.get("assignment").is_some());
        assert!(registry.get("missing").is_none());
    }
}
