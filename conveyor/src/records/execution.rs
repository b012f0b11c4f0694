//! Versioned execution records and the unversioned request that relays
//! between stages.
//!
//! Every stage an execution passes stores its contribution under a fresh
//! composite key instead of overwriting a shared record. The request that
//! travels the queues is the canonical description composed at intake;
//! stages forward it untouched and derive their stored record from it.

use super::status::JobStatus;
use crate::utils::{rfc3339_timestamp, unix_seconds};
use serde::{Deserialize, Serialize};

/// Builds the composite store key `{name}#v{version}#{stage}`.
///
/// Distinct versions of the same logical execution never collide, so a
/// redelivered message regenerates the same key rather than a new one.
#[must_use]
pub fn composite_key(original_name: &str, version: u32, stage: &str) -> String {
    format!("{original_name}#v{version}#{stage}")
}

/// The canonical execution description composed at intake and relayed
/// unchanged through every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// The logical, unversioned execution name.
    pub execution_name: String,
    /// Correlation id; must match on every later operation that
    /// references this execution.
    pub execution_uuid: String,
    /// Status at composition time.
    pub status: JobStatus,
    /// Set once at intake; copied forward verbatim, never recomputed.
    pub created_at: String,
    /// Last touch at composition time.
    pub updated_at: String,
    /// Version at composition time (always 1 for intake-composed
    /// requests).
    pub version: u32,
    /// Stage that composed the request.
    pub stage: String,
    /// Identifier of the composing stage.
    pub processed_by: String,
    /// Unix seconds at composition time.
    pub timestamp: i64,
    /// Set when the caller restarted an execution under an existing name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retake: Option<bool>,
}

impl ExecutionRequest {
    /// Composes the intake request for a new execution.
    #[must_use]
    pub fn intake(
        execution_name: impl Into<String>,
        execution_uuid: impl Into<String>,
        stage: &str,
        processed_by: &str,
    ) -> Self {
        let now = rfc3339_timestamp();
        Self {
            execution_name: execution_name.into(),
            execution_uuid: execution_uuid.into(),
            status: JobStatus::Submitted,
            created_at: now.clone(),
            updated_at: now,
            version: 1,
            stage: stage.to_string(),
            processed_by: processed_by.to_string(),
            timestamp: unix_seconds(),
            retake: None,
        }
    }

    /// Marks the request as a restart of an existing execution name.
    #[must_use]
    pub fn with_retake(mut self) -> Self {
        self.retake = Some(true);
        self
    }
}

/// One stage's stored contribution to an execution, keyed by
/// [`composite_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// The composite key this record is stored under.
    pub execution_name: String,
    /// The logical, unversioned execution name.
    pub original_name: String,
    /// Correlation id, identical across all versions of one execution.
    pub execution_uuid: String,
    /// Status contributed by the producing stage.
    pub status: JobStatus,
    /// Copied forward verbatim from the intake request.
    pub created_at: String,
    /// When the producing stage wrote this record.
    pub updated_at: String,
    /// 1-based pipeline position of the producing stage.
    pub version: u32,
    /// Name of the producing stage.
    pub stage: String,
    /// Identifier of the producing stage.
    pub processed_by: String,
    /// Unix seconds when the producing stage wrote this record.
    pub timestamp: i64,
    /// Worker identity, contributed by the assignment stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    /// Runner identity, contributed by the execution stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_id: Option<String>,
}

impl ExecutionRecord {
    /// Derives one stage's record from the relayed request.
    ///
    /// `created_at` and `execution_uuid` come from the request verbatim;
    /// `version`, `stage`, `processed_by`, and `status` are the producing
    /// stage's own contribution.
    #[must_use]
    pub fn for_stage(
        request: &ExecutionRequest,
        stage: &str,
        processed_by: &str,
        version: u32,
        status: JobStatus,
    ) -> Self {
        Self {
            execution_name: composite_key(&request.execution_name, version, stage),
            original_name: request.execution_name.clone(),
            execution_uuid: request.execution_uuid.clone(),
            status,
            created_at: request.created_at.clone(),
            updated_at: rfc3339_timestamp(),
            version,
            stage: stage.to_string(),
            processed_by: processed_by.to_string(),
            timestamp: unix_seconds(),
            worker_id: None,
            runner_id: None,
        }
    }

    /// Attaches the worker identity.
    #[must_use]
    pub fn with_worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    /// Attaches the runner identity.
    #[must_use]
    pub fn with_runner(mut self, runner_id: impl Into<String>) -> Self {
        self.runner_id = Some(runner_id.into());
        self
    }
}
