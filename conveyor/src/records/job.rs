//! The shared job record, upserted by the job-flow stages.

use super::status::JobStatus;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One unit of work traveling through the pipeline.
///
/// `id` is assigned at intake and immutable afterwards. Each job-flow
/// stage writes its own status value and stage-specific fields; the
/// record is never deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Stable identity. Empty on a submission request until intake
    /// assigns one.
    #[serde(default)]
    pub id: String,
    /// Human-readable name.
    pub job_name: String,
    /// Work kind: `shell`, `python`, `sql`, or anything else.
    pub job_type: String,
    /// Opaque client-supplied parameters.
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    /// Client-supplied priority, 1 = most urgent.
    pub priority: u32,
    /// When the client wants the work to run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<Timestamp>,
    /// Set once at intake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    /// Bumped by every stage that touches the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    /// Pipeline position, see [`JobStatus`].
    #[serde(default)]
    pub status: JobStatus,
    /// Identity of the worker that picked the job up (assignment stage).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    /// Identity of the runner that executed the job (execution stage).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_id: Option<String>,
    /// Output of the simulated execution (execution stage).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_log: Option<String>,
}

impl JobRecord {
    /// Creates a minimal record in the submitted state. Mostly useful in
    /// tests and demos; real submissions arrive as deserialized requests.
    #[must_use]
    pub fn new(job_name: impl Into<String>, job_type: impl Into<String>, priority: u32) -> Self {
        Self {
            id: String::new(),
            job_name: job_name.into(),
            job_type: job_type.into(),
            parameters: HashMap::new(),
            priority,
            scheduled_at: None,
            created_at: None,
            updated_at: None,
            status: JobStatus::Submitted,
            worker_id: None,
            runner_id: None,
            execution_log: None,
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Adds one parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Returns true if this record's status moves the stored record
    /// forward. A `None` for `stored` means the record is new and always
    /// writable.
    #[must_use]
    pub fn advances_over(&self, stored: Option<&Self>) -> bool {
        match stored {
            None => true,
            Some(prior) => self.status.advances(&prior.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_minimal_submission() {
        let body = r#"{"job_name":"nightly-sync","job_type":"shell","priority":1}"#;
        let job: JobRecord = serde_json::from_str(body).unwrap();
        assert_eq!(job.id, "");
        assert_eq!(job.job_name, "nightly-sync");
        assert_eq!(job.status, JobStatus::Submitted);
        assert!(job.parameters.is_empty());
    }

    #[test]
    fn test_missing_required_fields_fail_decode() {
        let body = r#"{"id":"abc"}"#;
        assert!(serde_json::from_str::<JobRecord>(body).is_err());
    }

    #[test]
    fn test_wire_format_uses_snake_case() {
        let job = JobRecord::new("report", "sql", 2).with_id("job-1");
        let value = serde_json::to_value(&job).unwrap();
        assert!(value.get("job_name").is_some());
        assert!(value.get("job_type").is_some());
        assert_eq!(value.get("status").unwrap(), "submitted");
        // Unset stage fields stay off the wire.
        assert!(value.get("worker_id").is_none());
        assert!(value.get("runner_id").is_none());
    }

    #[test]
    fn test_advances_over_new_record() {
        let job = JobRecord::new("a", "shell", 1).with_id("j");
        assert!(job.advances_over(None));
    }

    #[test]
    fn test_advances_over_stale_record_is_refused() {
        let mut fresh = JobRecord::new("a", "shell", 1).with_id("j");
        fresh.status = JobStatus::Processed;
        let mut stale = fresh.clone();
        stale.status = JobStatus::Integrated;

        assert!(fresh.advances_over(Some(&stale)));
        assert!(!stale.advances_over(Some(&fresh)));
        assert!(!fresh.advances_over(Some(&fresh.clone())));
    }
}
