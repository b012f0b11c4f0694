//! Integration stage, the first queue-fed stop after intake.

use super::{
    persist_job, relay_execution, require_job_id, unexpected_variant, StageContext, StageHandler,
};
use crate::errors::ConveyorError;
use crate::records::{ExecutionRecord, RelayMessage};
use crate::topology::StageName;
use crate::utils::now_utc;
use async_trait::async_trait;
use tracing::info;

const STAGE: StageName = StageName::Integration;

/// Marks submitted jobs as integrated and records the second execution
/// version.
#[derive(Debug, Default)]
pub struct IntegrationHandler;

impl IntegrationHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageHandler for IntegrationHandler {
    fn name(&self) -> &'static str {
        STAGE.as_str()
    }

    async fn handle(&self, context: &StageContext, body: &str) -> Result<(), ConveyorError> {
        match RelayMessage::decode(self.name(), body)? {
            RelayMessage::Job(mut job) => {
                require_job_id(STAGE, &job)?;
                job.status = STAGE.status();
                job.updated_at = Some(now_utc());
                persist_job(context, &job).await?;
                info!(job_id = %job.id, job_name = %job.job_name, "job integrated");
                context.forward(serde_json::to_string(&job)?).await
            }
            RelayMessage::Execution(request) => {
                let record = ExecutionRecord::for_stage(
                    &request,
                    STAGE.as_str(),
                    STAGE.processed_by(),
                    STAGE.position(),
                    STAGE.status(),
                );
                relay_execution(context, &request, record).await
            }
            other => Err(unexpected_variant(STAGE, &other).into()),
        }
    }
}
