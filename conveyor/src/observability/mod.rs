//! Read-only operational surfaces.
//!
//! Nothing here is authoritative: the stats counters and the recent
//! cache exist for health and inspection endpoints, and correctness
//! never depends on them.

mod cache;
mod stats;

pub use cache::{CacheEntry, RecentCache};
pub use stats::{StageStats, StatsRegistry};
