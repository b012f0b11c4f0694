//! Downstream artifacts created by the tail stages of the pipeline.
//!
//! Each artifact is written only by the stage that creates it and carries
//! a back-reference to its upstream entity. Later stages read artifacts
//! by back-reference, never mutate them.

use super::status::JobStatus;
use crate::utils::{generate_uuid, now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The cron expression assigned when the upstream payload carries none.
pub const DEFAULT_CRON_EXPR: &str = "0 */5 * * * *";

/// Qualitative classification of a schedule's cron expression.
///
/// Derived by direct equality against a closed set of known expressions.
/// This is deliberately not a cron parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    /// Every five minutes.
    Frequent,
    /// Top of every hour.
    Hourly,
    /// Midnight every day.
    Daily,
    /// Anything the closed table does not recognize.
    Custom,
}

impl AdapterType {
    /// Classifies a cron expression via the closed lookup table.
    #[must_use]
    pub fn from_cron(expr: &str) -> Self {
        match expr {
            "0 */5 * * * *" => Self::Frequent,
            "0 0 * * * *" => Self::Hourly,
            "0 0 0 * * *" => Self::Daily,
            _ => Self::Custom,
        }
    }

    /// Delivery priority for this adapter type, 1 = most urgent.
    #[must_use]
    pub fn priority(self) -> u32 {
        match self {
            Self::Frequent => 1,
            Self::Hourly | Self::Custom => 2,
            Self::Daily => 3,
        }
    }
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frequent => write!(f, "frequent"),
            Self::Hourly => write!(f, "hourly"),
            Self::Daily => write!(f, "daily"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// A recurring schedule derived from a job by the scheduling stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Fresh identity of the schedule itself.
    pub id: String,
    /// Back-reference to the job this schedule was derived from.
    pub job_id: String,
    /// Cron expression driving the schedule.
    pub cron_expr: String,
    /// Next firing time.
    pub next_run: Timestamp,
    /// Last firing time, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<Timestamp>,
    /// Whether the schedule is live.
    pub is_active: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
}

impl Schedule {
    /// Derives the schedule for a job. New schedules fire five minutes
    /// out on the default cron expression.
    #[must_use]
    pub fn for_job(job_id: impl Into<String>) -> Self {
        let now = now_utc();
        Self {
            id: generate_uuid(),
            job_id: job_id.into(),
            cron_expr: DEFAULT_CRON_EXPR.to_string(),
            next_run: now + chrono::Duration::minutes(5),
            last_run: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fixed settings attached to every adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterSettings {
    /// The cron expression the adapter was classified from.
    pub cron_expression: String,
    /// Delivery retry budget.
    pub retry_count: u32,
    /// Per-delivery timeout.
    pub timeout: String,
    /// Qualitative priority label.
    pub priority: String,
}

impl AdapterSettings {
    fn for_cron(cron_expression: impl Into<String>) -> Self {
        Self {
            cron_expression: cron_expression.into(),
            retry_count: 3,
            timeout: "30s".to_string(),
            priority: "normal".to_string(),
        }
    }
}

/// An adapter derived from a schedule by the adapter-configuration stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Fresh identity of the adapter itself.
    pub id: String,
    /// Back-reference to the schedule this adapter was derived from.
    pub schedule_id: String,
    /// Classification of the schedule's cron expression.
    pub adapter_type: AdapterType,
    /// Fixed adapter settings.
    pub config: AdapterSettings,
    /// Always `adapter-configured` once created.
    pub status: JobStatus,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
}

impl AdapterConfig {
    /// Derives the adapter for a schedule. An empty cron expression
    /// falls back to [`DEFAULT_CRON_EXPR`].
    #[must_use]
    pub fn for_schedule(schedule_id: impl Into<String>, cron_expr: &str) -> Self {
        let cron = if cron_expr.is_empty() {
            DEFAULT_CRON_EXPR
        } else {
            cron_expr
        };
        let now = now_utc();
        Self {
            id: generate_uuid(),
            schedule_id: schedule_id.into(),
            adapter_type: AdapterType::from_cron(cron),
            config: AdapterSettings::for_cron(cron),
            status: JobStatus::AdapterConfigured,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Delivery state of a terminal queue message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Created, settle pending.
    Pending,
    /// Settled.
    Delivered,
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Delivered => write!(f, "delivered"),
        }
    }
}

/// The payload carried by a terminal queue message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuePayload {
    /// Classification of the adapter the message was derived from.
    pub adapter_type: AdapterType,
    /// Back-reference to the schedule behind that adapter.
    pub schedule_id: String,
}

/// The terminal artifact produced by the delivery stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Fresh identity of the message itself.
    pub id: String,
    /// Back-reference to the adapter this message was derived from.
    pub adapter_id: String,
    /// Always `adapter_configuration`.
    pub message_type: String,
    /// Derived payload.
    pub payload: QueuePayload,
    /// Settles from pending to delivered.
    pub status: DeliveryState,
    /// Derived from the adapter type.
    pub priority: u32,
    /// Delivery retries performed so far.
    pub retry_count: u32,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// When the message settled, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<Timestamp>,
}

impl QueueMessage {
    /// Derives the pending queue message for an adapter.
    #[must_use]
    pub fn for_adapter(adapter: &AdapterConfig) -> Self {
        let now = now_utc();
        Self {
            id: generate_uuid(),
            adapter_id: adapter.id.clone(),
            message_type: "adapter_configuration".to_string(),
            payload: QueuePayload {
                adapter_type: adapter.adapter_type,
                schedule_id: adapter.schedule_id.clone(),
            },
            status: DeliveryState::Pending,
            priority: adapter.adapter_type.priority(),
            retry_count: 0,
            created_at: now,
            updated_at: now,
            delivered_at: None,
        }
    }

    /// Settles the message.
    pub fn mark_delivered(&mut self) {
        let now = now_utc();
        self.status = DeliveryState::Delivered;
        self.delivered_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_adapter_type_classification_table() {
        assert_eq!(AdapterType::from_cron("0 */5 * * * *"), AdapterType::Frequent);
        assert_eq!(AdapterType::from_cron("0 0 * * * *"), AdapterType::Hourly);
        assert_eq!(AdapterType::from_cron("0 0 0 * * *"), AdapterType::Daily);
        assert_eq!(AdapterType::from_cron("*/7 1 2 3 4 5"), AdapterType::Custom);
        assert_eq!(AdapterType::from_cron(""), AdapterType::Custom);
    }

    #[test]
    fn test_adapter_type_priority_table() {
        assert_eq!(AdapterType::Frequent.priority(), 1);
        assert_eq!(AdapterType::Hourly.priority(), 2);
        assert_eq!(AdapterType::Daily.priority(), 3);
        assert_eq!(AdapterType::Custom.priority(), 2);
    }

    #[test]
    fn test_schedule_for_job_defaults() {
        let schedule = Schedule::for_job("job-1");
        assert_eq!(schedule.job_id, "job-1");
        assert_eq!(schedule.cron_expr, DEFAULT_CRON_EXPR);
        assert!(schedule.is_active);
        assert!(schedule.next_run > schedule.created_at);
        assert_eq!(schedule.last_run, None);
    }

    #[test]
    fn test_adapter_for_schedule_empty_cron_falls_back() {
        let adapter = AdapterConfig::for_schedule("sched-1", "");
        assert_eq!(adapter.adapter_type, AdapterType::Frequent);
        assert_eq!(adapter.config.cron_expression, DEFAULT_CRON_EXPR);
        assert_eq!(adapter.config.retry_count, 3);
        assert_eq!(adapter.config.timeout, "30s");
        assert_eq!(adapter.status, JobStatus::AdapterConfigured);
    }

    #[test]
    fn test_queue_message_derivation_and_settlement() {
        let adapter = AdapterConfig::for_schedule("sched-1", "0 0 0 * * *");
        let mut message = QueueMessage::for_adapter(&adapter);

        assert_eq!(message.adapter_id, adapter.id);
        assert_eq!(message.message_type, "adapter_configuration");
        assert_eq!(message.priority, 3);
        assert_eq!(message.payload.schedule_id, "sched-1");
        assert_eq!(message.status, DeliveryState::Pending);
        assert_eq!(message.delivered_at, None);

        message.mark_delivered();
        assert_eq!(message.status, DeliveryState::Delivered);
        assert!(message.delivered_at.is_some());
    }

    #[test]
    fn test_delivery_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&DeliveryState::Pending).unwrap(), r#""pending""#);
        assert_eq!(
            serde_json::to_string(&DeliveryState::Delivered).unwrap(),
            r#""delivered""#
        );
    }
}
