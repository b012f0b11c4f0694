//! Ingress facade: the intake side of the pipeline.
//!
//! Jobs enter stamped but unstored; their first store write happens at
//! integration. Executions differ: intake immediately stores version
//! one so a stop request has a record to match against, then the relay
//! request rides the same entry queue as jobs.

use crate::errors::{ConveyorError, IdentityMismatchError};
use crate::observability::RecentCache;
use crate::queue::DurableQueue;
use crate::records::{composite_key, ExecutionRecord, ExecutionRequest, JobRecord, JobStatus};
use crate::store::{StateStore, Table};
use crate::topology::StageName;
use crate::utils::{generate_uuid, now_utc, rfc3339_timestamp, unix_seconds};
use std::sync::Arc;
use tracing::info;

const ENTRY_QUEUE: &str = match StageName::Intake.outbound_queue() {
    Some(queue) => queue,
    None => "integration-inbound",
};

/// Validates, stamps, and enqueues new work.
#[derive(Clone)]
pub struct Ingress {
    store: Arc<dyn StateStore>,
    queue: Arc<dyn DurableQueue>,
    cache: Arc<RecentCache>,
}

impl Ingress {
    /// Creates the facade over the pipeline's shared backends.
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        queue: Arc<dyn DurableQueue>,
        cache: Arc<RecentCache>,
    ) -> Self {
        Self {
            store,
            queue,
            cache,
        }
    }

    /// Submits one job for processing.
    ///
    /// The returned record carries the assigned id, submitted status,
    /// and creation time. Nothing is stored here.
    ///
    /// # Errors
    ///
    /// [`ConveyorError::InvalidRequest`] when the submission fails
    /// validation, [`ConveyorError::Forward`] when the entry queue
    /// rejects it.
    pub async fn submit_job(&self, mut job: JobRecord) -> Result<JobRecord, ConveyorError> {
        if job.job_name.trim().is_empty() {
            return Err(ConveyorError::InvalidRequest(
                "job_name must not be empty".to_string(),
            ));
        }
        if job.job_type.trim().is_empty() {
            return Err(ConveyorError::InvalidRequest(
                "job_type must not be empty".to_string(),
            ));
        }
        if job.priority == 0 {
            return Err(ConveyorError::InvalidRequest(
                "priority must be at least 1".to_string(),
            ));
        }

        if job.id.is_empty() {
            job.id = generate_uuid();
        }
        job.status = JobStatus::Submitted;
        job.created_at = Some(now_utc());

        let body = serde_json::to_string(&job)?;
        self.cache.record("job", &job.id, &body);
        self.queue.send(ENTRY_QUEUE, body).await?;
        info!(job_id = %job.id, job_name = %job.job_name, "job submitted");
        Ok(job)
    }

    /// Starts an execution under a logical name.
    ///
    /// Writes the intake version of the execution record and enqueues
    /// the relay request. Starting an already-used name restarts it: the
    /// intake record is overwritten under a fresh correlation UUID.
    ///
    /// # Errors
    ///
    /// [`ConveyorError::InvalidRequest`] on a blank name, otherwise
    /// store and queue failures.
    pub async fn start_execution(
        &self,
        execution_name: &str,
        retake: bool,
    ) -> Result<ExecutionRequest, ConveyorError> {
        if execution_name.trim().is_empty() {
            return Err(ConveyorError::InvalidRequest(
                "executionName must not be empty".to_string(),
            ));
        }

        let stage = StageName::Intake;
        let mut request = ExecutionRequest::intake(
            execution_name,
            generate_uuid(),
            stage.as_str(),
            stage.processed_by(),
        );
        if retake {
            request = request.with_retake();
        }

        let record = ExecutionRecord::for_stage(
            &request,
            stage.as_str(),
            stage.processed_by(),
            stage.position(),
            stage.status(),
        );
        self.store
            .put(
                Table::Jobs,
                &record.execution_name,
                serde_json::to_value(&record)?,
            )
            .await?;

        let body = serde_json::to_string(&request)?;
        self.cache.record("execution", &request.execution_uuid, &body);
        self.queue.send(ENTRY_QUEUE, body).await?;
        info!(
            execution_name = %request.execution_name,
            execution_uuid = %request.execution_uuid,
            retake,
            "execution started"
        );
        Ok(request)
    }

    /// Stops an execution by name, guarded by its correlation UUID.
    ///
    /// # Errors
    ///
    /// [`ConveyorError::ExecutionNotFound`] when the name has no intake
    /// record, [`ConveyorError::IdentityMismatch`] when the presented
    /// UUID is not the stored one.
    pub async fn stop_execution(
        &self,
        execution_name: &str,
        execution_uuid: &str,
    ) -> Result<ExecutionRecord, ConveyorError> {
        let key = composite_key(execution_name, 1, StageName::Intake.as_str());
        let stored = self
            .store
            .get(Table::Jobs, &key)
            .await?
            .ok_or_else(|| ConveyorError::ExecutionNotFound(execution_name.to_string()))?;
        let mut record: ExecutionRecord = serde_json::from_value(stored)?;
        if record.execution_uuid != execution_uuid {
            return Err(IdentityMismatchError::new(execution_name, execution_uuid).into());
        }

        record.status = JobStatus::Stopped;
        record.updated_at = rfc3339_timestamp();
        record.timestamp = unix_seconds();
        self.store
            .put(Table::Jobs, &key, serde_json::to_value(&record)?)
            .await?;
        info!(execution_name = %execution_name, "execution stopped");
        Ok(record)
    }

    /// Every job record currently stored.
    ///
    /// # Errors
    ///
    /// Returns store failures.
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>, ConveyorError> {
        let values = self.store.scan(Table::Jobs).await?;
        Ok(values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect())
    }

    /// Every versioned execution record currently stored.
    ///
    /// # Errors
    ///
    /// Returns store failures.
    pub async fn list_executions(&self) -> Result<Vec<ExecutionRecord>, ConveyorError> {
        let values = self.store.scan(Table::Jobs).await?;
        Ok(values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueueHub;
    use crate::stages::testkit::pop_body;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn rig() -> (Ingress, Arc<MemoryStore>, Arc<MemoryQueueHub>) {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueueHub::new());
        queue.create_queue(ENTRY_QUEUE);
        let ingress = Ingress::new(
            Arc::clone(&store) as Arc<dyn StateStore>,
            Arc::clone(&queue) as Arc<dyn DurableQueue>,
            Arc::new(RecentCache::new(16)),
        );
        (ingress, store, queue)
    }

    #[tokio::test]
    async fn test_submit_stamps_and_enqueues_without_storing() {
        let (ingress, store, queue) = rig();

        let job = ingress
            .submit_job(JobRecord::new("daily-report", "shell", 2))
            .await
            .unwrap();

        assert!(!job.id.is_empty());
        assert_eq!(job.status, JobStatus::Submitted);
        assert!(job.created_at.is_some());
        assert!(store.is_empty());

        let body = pop_body(&queue, ENTRY_QUEUE).await.unwrap();
        let enqueued: JobRecord = serde_json::from_str(&body).unwrap();
        assert_eq!(enqueued.id, job.id);
    }

    #[tokio::test]
    async fn test_submit_rejects_incomplete_jobs() {
        let (ingress, _store, _queue) = rig();

        let blank_name = ingress
            .submit_job(JobRecord::new("  ", "shell", 2))
            .await
            .unwrap_err();
        assert!(matches!(blank_name, ConveyorError::InvalidRequest(_)));

        let blank_type = ingress
            .submit_job(JobRecord::new("report", "", 2))
            .await
            .unwrap_err();
        assert!(matches!(blank_type, ConveyorError::InvalidRequest(_)));

        let zero_priority = ingress
            .submit_job(JobRecord::new("report", "shell", 0))
            .await
            .unwrap_err();
        assert!(zero_priority.to_string().contains("priority"));
    }

    #[tokio::test]
    async fn test_start_execution_writes_the_intake_version() {
        let (ingress, store, queue) = rig();

        let request = ingress.start_execution("nightly-sync", false).await.unwrap();
        assert_eq!(request.version, 1);
        assert_eq!(request.stage, "intake");
        assert_eq!(request.status, JobStatus::Submitted);
        assert_eq!(request.created_at, request.updated_at);
        assert_eq!(request.retake, None);

        let stored = store
            .get(Table::Jobs, "nightly-sync#v1#intake")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["executionUuid"], request.execution_uuid.as_str());
        assert_eq!(stored["originalName"], "nightly-sync");

        let body = pop_body(&queue, ENTRY_QUEUE).await.unwrap();
        let enqueued: ExecutionRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(enqueued, request);

        let blank = ingress.start_execution("  ", false).await.unwrap_err();
        assert!(matches!(blank, ConveyorError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_restart_reclaims_the_name_under_a_new_uuid() {
        let (ingress, store, _queue) = rig();

        let first = ingress.start_execution("nightly-sync", false).await.unwrap();
        let second = ingress.start_execution("nightly-sync", true).await.unwrap();
        assert_ne!(first.execution_uuid, second.execution_uuid);
        assert_eq!(second.retake, Some(true));

        let stored = store
            .get(Table::Jobs, "nightly-sync#v1#intake")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["executionUuid"], second.execution_uuid.as_str());
    }

    #[tokio::test]
    async fn test_stop_requires_the_matching_uuid() {
        let (ingress, store, _queue) = rig();
        let request = ingress.start_execution("nightly-sync", false).await.unwrap();

        let mismatch = ingress
            .stop_execution("nightly-sync", "not-the-uuid")
            .await
            .unwrap_err();
        assert!(matches!(mismatch, ConveyorError::IdentityMismatch(_)));
        assert_eq!(mismatch.to_string(), "Execution UUID mismatch");

        let stopped = ingress
            .stop_execution("nightly-sync", &request.execution_uuid)
            .await
            .unwrap();
        assert_eq!(stopped.status, JobStatus::Stopped);

        let stored = store
            .get(Table::Jobs, "nightly-sync#v1#intake")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["status"], "stopped");

        let missing = ingress
            .stop_execution("never-started", "whatever")
            .await
            .unwrap_err();
        assert!(matches!(missing, ConveyorError::ExecutionNotFound(_)));
    }

    #[tokio::test]
    async fn test_listings_separate_jobs_from_execution_records() {
        let (ingress, store, _queue) = rig();

        let mut job = JobRecord::new("daily-report", "shell", 2).with_id("job-1");
        job.status = JobStatus::Integrated;
        store
            .put(Table::Jobs, "job-1", serde_json::to_value(&job).unwrap())
            .await
            .unwrap();
        let request = ingress.start_execution("nightly-sync", false).await.unwrap();

        let jobs = ingress.list_jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "job-1");

        let executions = ingress.list_executions().await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].execution_uuid, request.execution_uuid);
        assert_eq!(executions[0].version, 1);
    }
}
