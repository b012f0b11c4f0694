//! Scheduling stage, where executed jobs gain a recurring schedule.

use super::{relay_execution, require_job_id, unexpected_variant, StageContext, StageHandler};
use crate::errors::ConveyorError;
use crate::records::{ExecutionRecord, RelayMessage, Schedule};
use crate::store::Table;
use crate::topology::StageName;
use async_trait::async_trait;
use tracing::{debug, info};

const STAGE: StageName = StageName::Scheduling;

/// Derives at most one schedule per job.
///
/// Schedules are keyed by the job they came from, so a redelivered job
/// finds the stored schedule and forwards that instead of minting a
/// duplicate.
#[derive(Debug, Default)]
pub struct SchedulingHandler;

impl SchedulingHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageHandler for SchedulingHandler {
    fn name(&self) -> &'static str {
        STAGE.as_str()
    }

    async fn handle(&self, context: &StageContext, body: &str) -> Result<(), ConveyorError> {
        match RelayMessage::decode(self.name(), body)? {
            RelayMessage::Job(job) => {
                require_job_id(STAGE, &job)?;
                let stored = context.store().get(Table::Schedules, &job.id).await?;
                let schedule: Schedule = match stored {
                    Some(value) => {
                        debug!(job_id = %job.id, "schedule already derived");
                        serde_json::from_value(value)?
                    }
                    None => {
                        let schedule = Schedule::for_job(job.id.clone());
                        context
                            .store()
                            .put(Table::Schedules, &job.id, serde_json::to_value(&schedule)?)
                            .await?;
                        info!(
                            job_id = %job.id,
                            schedule_id = %schedule.id,
                            cron_expr = %schedule.cron_expr,
                            "schedule derived"
                        );
                        schedule
                    }
                };
                context.forward(serde_json::to_string(&schedule)?).await
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ExecutionRequest, JobRecord, JobStatus, DEFAULT_CRON_EXPR};
    use crate::stages::testkit::{pop_body, rig_for};
    use crate::store::StateStore;
    use crate::utils::generate_uuid;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_redelivered_job_reuses_the_stored_schedule() {
        let rig = rig_for(STAGE);
        let handler = SchedulingHandler::new();
        let mut job = JobRecord::new("daily-report", "shell", 2).with_id("job-1");
        job.status = JobStatus::Executed;
        let body = serde_json::to_string(&job).unwrap();

        handler.handle(&rig.context, &body).await.unwrap();
        handler.handle(&rig.context, &body).await.unwrap();

        assert_eq!(rig.store.table_len(Table::Schedules), 1);

        let first = pop_body(&rig.queue, "adapter-configuration-inbound")
            .await
            .unwrap();
        let second = pop_body(&rig.queue, "adapter-configuration-inbound")
            .await
            .unwrap();
        let first: Schedule = serde_json::from_str(&first).unwrap();
        let second: Schedule = serde_json::from_str(&second).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.job_id, "job-1");
        assert_eq!(first.cron_expr, DEFAULT_CRON_EXPR);
        assert!(first.is_active);
    }

    #[tokio::test]
    async fn test_job_without_an_id_is_poison() {
        let rig = rig_for(STAGE);
        let job = JobRecord::new("daily-report", "shell", 2);
        let body = serde_json::to_string(&job).unwrap();

        let err = SchedulingHandler::new()
            .handle(&rig.context, &body)
            .await
            .unwrap_err();
        assert!(matches!(err, ConveyorError::Decode(_)));
        assert_eq!(rig.store.table_len(Table::Schedules), 0);
    }

    #[tokio::test]
    async fn test_execution_gets_a_fifth_version_and_no_schedule() {
        let rig = rig_for(STAGE);
        let request = ExecutionRequest::intake("nightly", generate_uuid(), "intake", "INTAKE");
        let body = serde_json::to_string(&request).unwrap();

        SchedulingHandler::new()
            .handle(&rig.context, &body)
            .await
            .unwrap();

        let stored = rig
            .store
            .get(Table::Jobs, "nightly#v5#scheduling")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["version"], 5);
        assert_eq!(stored["status"], "scheduled");
        assert_eq!(rig.store.table_len(Table::Schedules), 0);

        let forwarded = pop_body(&rig.queue, "adapter-configuration-inbound")
            .await
            .unwrap();
        let forwarded: ExecutionRequest = serde_json::from_str(&forwarded).unwrap();
        assert_eq!(forwarded, request);
    }
}
