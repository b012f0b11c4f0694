//! The record model: the entities exchanged on queues and persisted in
//! the state store.
//!
//! Jobs are shared rows upserted as they move through the head of the
//! pipeline. Executions store one fresh composite-keyed record per stage.
//! The tail stages transform the payload into downstream artifacts.

pub mod artifact;
pub mod decode;
pub mod execution;
pub mod job;
pub mod status;

pub use artifact::{
    AdapterConfig, AdapterSettings, AdapterType, DeliveryState, QueueMessage, QueuePayload,
    Schedule, DEFAULT_CRON_EXPR,
};
pub use decode::RelayMessage;
pub use execution::{composite_key, ExecutionRecord, ExecutionRequest};
pub use job::JobRecord;
pub use status::JobStatus;
