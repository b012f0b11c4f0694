//! # Conveyor
//!
//! A Rust implementation of a staged asynchronous relay pipeline.
//!
//! Conveyor moves work through seven fixed stages over durable queues
//! and a shared state store, with support for:
//!
//! - **Queue-fed stages**: One generic consumer loop behind every stage
//! - **At-least-once delivery**: Visibility timeouts, one-shot handles,
//!   and idempotent handlers that tolerate redelivery
//! - **Two relay flows**: Augmented job records and immutable execution
//!   requests that leave a versioned record at every stage
//! - **Poison handling**: Undecodable messages are dropped, never retried
//! - **Structured shutdown**: Cancellation tokens, joined consumers, and
//!   drained settle tasks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conveyor::prelude::*;
//! use std::sync::Arc;
//!
//! // Wire the pipeline over in-memory backends
//! let store = Arc::new(MemoryStore::new());
//! let queue = Arc::new(MemoryQueueHub::new());
//! let runtime = PipelineRuntime::start(store, queue, RelayConfig::default());
//!
//! // Feed it
//! let ingress = runtime.ingress();
//! let job = ingress.submit_job(JobRecord::new("daily-report", "shell", 2)).await?;
//!
//! // Stop it
//! runtime.shutdown("operator stop").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod consumer;
pub mod errors;
pub mod ingress;
pub mod observability;
pub mod queue;
pub mod records;
pub mod runtime;
pub mod stages;
pub mod store;
pub mod topology;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancellationToken, StageTaskGroup};
    pub use crate::consumer::{ConsumerConfig, DeletePolicy, StageConsumer};
    pub use crate::errors::ConveyorError;
    pub use crate::ingress::Ingress;
    pub use crate::observability::{RecentCache, StageStats, StatsRegistry};
    pub use crate::queue::{DurableQueue, MemoryQueueHub, QueuedMessage};
    pub use crate::records::{
        AdapterConfig, AdapterType, DeliveryState, ExecutionRecord, ExecutionRequest, JobRecord,
        JobStatus, QueueMessage, RelayMessage, Schedule,
    };
    pub use crate::runtime::{PipelineObserver, PipelineRuntime, RelayConfig};
    pub use crate::stages::{StageContext, StageHandler};
    pub use crate::store::{MemoryStore, StateStore, Table};
    pub use crate::topology::{routes, StageName, StageRoute};
}
