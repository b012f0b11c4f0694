//! Closed-variant decoding of inter-stage message bodies.
//!
//! A queue message body is one of four known shapes, selected by a
//! discriminant field. A body matching no discriminant, or one that
//! matches a discriminant but fails its variant's full decode, is poison
//! and fails explicitly.

use super::artifact::{AdapterConfig, Schedule};
use super::execution::ExecutionRequest;
use super::job::JobRecord;
use crate::errors::DecodeError;
use serde_json::Value;

/// One decoded inter-stage message.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    /// An execution relaying through the pipeline (`executionName`).
    Execution(ExecutionRequest),
    /// An adapter flowing into the delivery stage (`adapter_type`).
    Adapter(AdapterConfig),
    /// A schedule flowing into the adapter-configuration stage
    /// (`cron_expr`).
    Schedule(Schedule),
    /// A job flowing through the head of the pipeline (`id`).
    Job(JobRecord),
}

impl RelayMessage {
    /// Decodes a raw message body.
    ///
    /// Discriminants are checked in a fixed order: `executionName`,
    /// `adapter_type`, `cron_expr`, `id`. The first match selects the
    /// variant; the body must then decode fully as that variant.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the body is not a JSON object, no
    /// discriminant matches, or the selected variant's decode fails.
    pub fn decode(stage: &str, body: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|err| DecodeError::new(stage, format!("invalid json: {err}")))?;

        let Some(fields) = value.as_object() else {
            return Err(DecodeError::new(stage, "payload is not a json object"));
        };

        if fields.contains_key("executionName") {
            return serde_json::from_value(value)
                .map(Self::Execution)
                .map_err(|err| DecodeError::new(stage, format!("malformed execution: {err}")));
        }
        if fields.contains_key("adapter_type") {
            return serde_json::from_value(value)
                .map(Self::Adapter)
                .map_err(|err| DecodeError::new(stage, format!("malformed adapter: {err}")));
        }
        if fields.contains_key("cron_expr") {
            return serde_json::from_value(value)
                .map(Self::Schedule)
                .map_err(|err| DecodeError::new(stage, format!("malformed schedule: {err}")));
        }
        if fields.contains_key("id") {
            return serde_json::from_value(value)
                .map(Self::Job)
                .map_err(|err| DecodeError::new(stage, format!("malformed job: {err}")));
        }

        Err(DecodeError::new(stage, "no known discriminant field"))
    }

    /// Short label of the decoded variant, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Execution(_) => "execution",
            Self::Adapter(_) => "adapter",
            Self::Schedule(_) => "schedule",
            Self::Job(_) => "job",
        }
    }
}
