//! Assignment stage, where jobs are claimed by a worker identity.

use super::{
    persist_job, relay_execution, require_job_id, unexpected_variant, StageContext, StageHandler,
};
use crate::errors::ConveyorError;
use crate::records::{ExecutionRecord, RelayMessage};
use crate::topology::StageName;
use crate::utils::{now_utc, unix_seconds};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

const STAGE: StageName = StageName::Assignment;

/// Claims integrated jobs for this process's worker identity.
///
/// The identity is minted once per handler instance, so every job this
/// process assigns carries the same `worker_id`.
#[derive(Debug)]
pub struct AssignmentHandler {
    worker_id: String,
    processing_delay: Duration,
}

impl AssignmentHandler {
    /// Creates the handler with a fresh worker identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            worker_id: format!("worker-{}", unix_seconds()),
            processing_delay: Duration::ZERO,
        }
    }

    /// Simulated per-job processing time. Zero by default.
    #[must_use]
    pub fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = delay;
        self
    }
}

impl Default for AssignmentHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageHandler for AssignmentHandler {
    fn name(&self) -> &'static str {
        STAGE.as_str()
    }

    fn identity(&self) -> String {
        self.worker_id.clone()
    }

    async fn handle(&self, context: &StageContext, body: &str) -> Result<(), ConveyorError> {
        match RelayMessage::decode(self.name(), body)? {
            RelayMessage::Job(mut job) => {
                require_job_id(STAGE, &job)?;
                if !self.processing_delay.is_zero() {
                    tokio::time::sleep(self.processing_delay).await;
                }
                job.status = STAGE.status();
                job.worker_id = Some(self.worker_id.clone());
                job.updated_at = Some(now_utc());
                persist_job(context, &job).await?;
                info!(job_id = %job.id, worker_id = %self.worker_id, "job assigned");
                context.forward(serde_json::to_string(&job)?).await
            }
            RelayMessage::Execution(request) => {
                let record = ExecutionRecord::for_stage(
                    &request,
                    STAGE.as_str(),
                    STAGE.processed_by(),
                    STAGE.position(),
                    STAGE.status(),
                )
                .with_worker(self.worker_id.clone());
                relay_execution(context, &request, record).await
            }
            other => Err(unexpected_variant(STAGE, &other).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ExecutionRequest, JobRecord, JobStatus};
    use crate::stages::testkit::{pop_body, rig_for};
    use crate::store::{StateStore, Table};
    use crate::utils::generate_uuid;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_job_is_claimed_by_the_worker() {
        let rig = rig_for(STAGE);
        let handler = AssignmentHandler::new();
        let mut job = JobRecord::new("daily-report", "shell", 2).with_id("job-1");
        job.status = JobStatus::Integrated;
        let body = serde_json::to_string(&job).unwrap();

        handler.handle(&rig.context, &body).await.unwrap();

        let forwarded = pop_body(&rig.queue, "execution-inbound").await.unwrap();
        let forwarded: JobRecord = serde_json::from_str(&forwarded).unwrap();
        assert_eq!(forwarded.status, JobStatus::Processed);
        assert_eq!(forwarded.worker_id.as_deref(), Some(handler.identity().as_str()));
        assert!(handler.identity().starts_with("worker-"));
    }

    #[tokio::test]
    async fn test_execution_record_carries_the_worker() {
        let rig = rig_for(STAGE);
        let handler = AssignmentHandler::new();
        let request = ExecutionRequest::intake("nightly", generate_uuid(), "intake", "INTAKE");
        let body = serde_json::to_string(&request).unwrap();

        handler.handle(&rig.context, &body).await.unwrap();

        let stored = rig
            .store
            .get(Table::Jobs, "nightly#v3#assignment")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["version"], 3);
        assert_eq!(stored["workerId"], handler.identity().as_str());
        assert_eq!(stored["status"], "processed");
    }
}
