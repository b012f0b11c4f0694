//! Execution stage, where claimed jobs are run by type.

use super::{
    persist_job, relay_execution, require_job_id, unexpected_variant, StageContext, StageHandler,
};
use crate::errors::ConveyorError;
use crate::records::{ExecutionRecord, JobRecord, RelayMessage};
use crate::topology::StageName;
use crate::utils::{now_utc, unix_seconds};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

const STAGE: StageName = StageName::Execution;

/// Runs processed jobs under this process's runner identity.
#[derive(Debug)]
pub struct ExecutionHandler {
    runner_id: String,
}

impl ExecutionHandler {
    /// Creates the handler with a fresh runner identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            runner_id: format!("runner-{}", unix_seconds()),
        }
    }

    /// Runs one job by its type and returns the execution log line.
    ///
    /// Shell jobs complete immediately; script and query types carry a
    /// simulated run time.
    async fn run_job(job: &JobRecord) -> String {
        match job.job_type.as_str() {
            "shell" => {
                format!(
                    "Shell execution result: Executing shell job: {}",
                    job.job_name
                )
            }
            "python" => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                format!("Python script executed successfully for job: {}", job.job_name)
            }
            "sql" => {
                tokio::time::sleep(Duration::from_millis(300)).await;
                format!("SQL query executed successfully for job: {}", job.job_name)
            }
            _ => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                format!("Default job executed successfully: {}", job.job_name)
            }
        }
    }
}

impl Default for ExecutionHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageHandler for ExecutionHandler {
    fn name(&self) -> &'static str {
        STAGE.as_str()
    }

    fn identity(&self) -> String {
        self.runner_id.clone()
    }

    async fn handle(&self, context: &StageContext, body: &str) -> Result<(), ConveyorError> {
        match RelayMessage::decode(self.name(), body)? {
            RelayMessage::Job(mut job) => {
                require_job_id(STAGE, &job)?;
                let log = Self::run_job(&job).await;
                job.status = STAGE.status();
                job.runner_id = Some(self.runner_id.clone());
                job.execution_log = Some(log);
                job.updated_at = Some(now_utc());
                persist_job(context, &job).await?;
                info!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    runner_id = %self.runner_id,
                    "job executed"
                );
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
                .with_runner(self.runner_id.clone());
                relay_execution(context, &request, record).await
            }
            other => Err(unexpected_variant(STAGE, &other).into()),
        }
    }
}
