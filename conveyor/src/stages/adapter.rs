//! Adapter-configuration stage, where schedules gain a typed adapter.

use super::{relay_execution, unexpected_variant, StageContext, StageHandler};
use crate::errors::ConveyorError;
use crate::records::{AdapterConfig, ExecutionRecord, RelayMessage};
use crate::store::Table;
use crate::topology::StageName;
use async_trait::async_trait;
use tracing::{debug, info};

const STAGE: StageName = StageName::AdapterConfiguration;

/// Derives at most one adapter per schedule, classified from the
/// schedule's cron expression.
#[derive(Debug, Default)]
pub struct AdapterConfigurationHandler;

impl AdapterConfigurationHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageHandler for AdapterConfigurationHandler {
    fn name(&self) -> &'static str {
        STAGE.as_str()
    }

    async fn handle(&self, context: &StageContext, body: &str) -> Result<(), ConveyorError> {
        match RelayMessage::decode(self.name(), body)? {
            RelayMessage::Schedule(schedule) => {
                let stored = context.store().get(Table::Adapters, &schedule.id).await?;
                let adapter: AdapterConfig = match stored {
                    Some(value) => {
                        debug!(schedule_id = %schedule.id, "adapter already derived");
                        serde_json::from_value(value)?
                    }
                    None => {
                        let adapter =
                            AdapterConfig::for_schedule(schedule.id.clone(), &schedule.cron_expr);
                        context
                            .store()
                            .put(
                                Table::Adapters,
                                &schedule.id,
                                serde_json::to_value(&adapter)?,
                            )
                            .await?;
                        info!(
                            schedule_id = %schedule.id,
                            adapter_id = %adapter.id,
                            adapter_type = %adapter.adapter_type,
                            "adapter configured"
                        );
                        adapter
                    }
                };
                context.forward(serde_json::to_string(&adapter)?).await
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
    use crate::records::{AdapterType, ExecutionRequest, JobRecord, Schedule};
    use crate::stages::testkit::{pop_body, rig_for};
    use crate::store::StateStore;
    use crate::utils::generate_uuid;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_schedule_gains_a_classified_adapter() {
        let rig = rig_for(STAGE);
        let mut schedule = Schedule::for_job("job-1");
        schedule.cron_expr = "0 0 0 * * *".to_string();
        let body = serde_json::to_string(&schedule).unwrap();

        AdapterConfigurationHandler::new()
            .handle(&rig.context, &body)
            .await
            .unwrap();

        let forwarded = pop_body(&rig.queue, "delivery-inbound").await.unwrap();
        let adapter: AdapterConfig = serde_json::from_str(&forwarded).unwrap();
        assert_eq!(adapter.schedule_id, schedule.id);
        assert_eq!(adapter.adapter_type, AdapterType::Daily);
        assert_eq!(adapter.config.cron_expression, "0 0 0 * * *");
        assert_eq!(adapter.config.retry_count, 3);
    }

    #[tokio::test]
    async fn test_redelivered_schedule_reuses_the_stored_adapter() {
        let rig = rig_for(STAGE);
        let handler = AdapterConfigurationHandler::new();
        let schedule = Schedule::for_job("job-1");
        let body = serde_json::to_string(&schedule).unwrap();

        handler.handle(&rig.context, &body).await.unwrap();
        handler.handle(&rig.context, &body).await.unwrap();

        assert_eq!(rig.store.table_len(Table::Adapters), 1);
        let first: AdapterConfig =
            serde_json::from_str(&pop_body(&rig.queue, "delivery-inbound").await.unwrap()).unwrap();
        let second: AdapterConfig =
            serde_json::from_str(&pop_body(&rig.queue, "delivery-inbound").await.unwrap()).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_execution_gets_a_sixth_version() {
        let rig = rig_for(STAGE);
        let request = ExecutionRequest::intake("nightly", generate_uuid(), "intake", "INTAKE");
        let body = serde_json::to_string(&request).unwrap();

        AdapterConfigurationHandler::new()
            .handle(&rig.context, &body)
            .await
            .unwrap();

        let stored = rig
            .store
            .get(Table::Jobs, "nightly#v6#adapter-configuration")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["version"], 6);
        assert_eq!(stored["status"], "adapter-configured");
        assert_eq!(stored["processedBy"], "ADAPTER-CONFIGURATION");
    }

    #[tokio::test]
    async fn test_job_payload_is_rejected_as_poison() {
        let rig = rig_for(STAGE);
        let job = JobRecord::new("daily-report", "shell", 2).with_id("job-1");
        let body = serde_json::to_string(&job).unwrap();

        let err = AdapterConfigurationHandler::new()
            .handle(&rig.context, &body)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unexpected job payload"));
    }
}
