//! Stage handlers and the context they run in.
//!
//! Every consumer stage implements [`StageHandler`]: decode the inbound
//! body, apply the stage's business rule, persist through the shared
//! store, forward to the next queue. Job records are forwarded in their
//! augmented form; execution requests are forwarded unchanged while each
//! stage stores its own versioned record beside them.

pub mod adapter;
pub mod assignment;
pub mod delivery;
pub mod execution;
pub mod integration;
pub mod scheduling;

pub use adapter::AdapterConfigurationHandler;
pub use assignment::AssignmentHandler;
pub use delivery::{DeliveryHandler, DeliveryTracker};
pub use execution::ExecutionHandler;
pub use integration::IntegrationHandler;
pub use scheduling::SchedulingHandler;

use crate::errors::{ConveyorError, DecodeError};
use crate::observability::{RecentCache, StageStats};
use crate::queue::DurableQueue;
use crate::records::{ExecutionRecord, ExecutionRequest, JobRecord, RelayMessage};
use crate::store::{StateStore, Table};
use crate::topology::StageName;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// One pipeline stage's message processor.
#[async_trait]
pub trait StageHandler: Send + Sync {
    /// The stage this handler implements.
    fn name(&self) -> &'static str;

    /// Identity reported in stats. Defaults to the stage name; stages
    /// with a per-process identity (worker, runner) override it.
    fn identity(&self) -> String {
        self.name().to_string()
    }

    /// Handles one raw message body.
    ///
    /// # Errors
    ///
    /// [`ConveyorError::Decode`] marks the message as poison; any other
    /// error is a business failure the consumer resolves through its
    /// deletion policy.
    async fn handle(&self, context: &StageContext, body: &str) -> Result<(), ConveyorError>;
}

/// Shared collaborators a handler works through.
pub struct StageContext {
    stage: StageName,
    store: Arc<dyn StateStore>,
    queue: Arc<dyn DurableQueue>,
    outbound: Option<String>,
    stats: Arc<StageStats>,
    cache: Arc<RecentCache>,
}

impl StageContext {
    /// Creates a context wired to one stage's route.
    #[must_use]
    pub fn new(
        stage: StageName,
        store: Arc<dyn StateStore>,
        queue: Arc<dyn DurableQueue>,
        outbound: Option<String>,
        stats: Arc<StageStats>,
        cache: Arc<RecentCache>,
    ) -> Self {
        Self {
            stage,
            store,
            queue,
            outbound,
            stats,
            cache,
        }
    }

    /// The stage this context belongs to.
    #[must_use]
    pub fn stage(&self) -> StageName {
        self.stage
    }

    /// The shared state store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// The queue transport.
    #[must_use]
    pub fn queue(&self) -> &Arc<dyn DurableQueue> {
        &self.queue
    }

    /// This stage's counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<StageStats> {
        &self.stats
    }

    /// The shared recent-record cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<RecentCache> {
        &self.cache
    }

    /// Sends a body to the next stage's queue. A tail stage has no
    /// outbound queue and forwarding becomes a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ConveyorError::Forward`] when the send fails.
    pub async fn forward(&self, body: String) -> Result<(), ConveyorError> {
        match &self.outbound {
            Some(queue) => {
                self.queue.send(queue, body).await?;
                Ok(())
            }
            None => {
                debug!(stage = %self.stage, "tail stage, nothing to forward");
                Ok(())
            }
        }
    }
}

/// Writes a job record unless the stored copy is already at or past the
/// incoming status. Returns whether the write happened.
///
/// Redelivered and out-of-order messages land here with a status the
/// store has already passed; skipping the write keeps the stored record
/// monotone.
pub(crate) async fn persist_job(
    context: &StageContext,
    job: &JobRecord,
) -> Result<bool, ConveyorError> {
    let stored = context.store.get(Table::Jobs, &job.id).await?;
    let prior: Option<JobRecord> = stored.map(serde_json::from_value).transpose()?;
    if job.advances_over(prior.as_ref()) {
        context
            .store
            .put(Table::Jobs, &job.id, serde_json::to_value(job)?)
            .await?;
        Ok(true)
    } else {
        debug!(job_id = %job.id, status = %job.status, "stale status write skipped");
        Ok(false)
    }
}

/// Stores one stage's versioned execution record and forwards the
/// original request unchanged.
///
/// A record under the same composite key with the same correlation UUID
/// is a redelivery; the write is skipped and only the forward happens. A
/// differing UUID means the execution was restarted under the same name
/// and the record is overwritten.
pub(crate) async fn relay_execution(
    context: &StageContext,
    request: &ExecutionRequest,
    record: ExecutionRecord,
) -> Result<(), ConveyorError> {
    let stored = context.store.get(Table::Jobs, &record.execution_name).await?;
    let fresh = match stored {
        None => true,
        Some(value) => {
            let existing: ExecutionRecord = serde_json::from_value(value)?;
            existing.execution_uuid != record.execution_uuid
        }
    };
    if fresh {
        context
            .store
            .put(
                Table::Jobs,
                &record.execution_name,
                serde_json::to_value(&record)?,
            )
            .await?;
    } else {
        debug!(key = %record.execution_name, "redelivered execution already recorded");
    }
    context.forward(serde_json::to_string(request)?).await
}

/// Rejects job payloads whose id field is present but blank. Such a
/// record cannot be keyed and is poison, not a retryable failure.
pub(crate) fn require_job_id(stage: StageName, job: &JobRecord) -> Result<(), DecodeError> {
    if job.id.is_empty() {
        return Err(DecodeError::new(stage.as_str(), "missing job id"));
    }
    Ok(())
}

/// Poison marker for a decodable payload the stage does not accept.
pub(crate) fn unexpected_variant(stage: StageName, message: &RelayMessage) -> DecodeError {
    DecodeError::new(
        stage.as_str(),
        format!("unexpected {} payload for this stage", message.kind()),
    )
}
