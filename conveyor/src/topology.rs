//! The fixed seven-stage pipeline layout.
//!
//! Stages are ordered intake through delivery. Intake is fed by the
//! ingress API rather than a queue, so six consumer routes exist. Each
//! consumer reads `<stage>-inbound` and forwards to the next stage's
//! inbound queue; delivery has no outbound.

use crate::records::JobStatus;
use std::fmt;

/// One stage of the relay pipeline, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageName {
    /// Ingress-fed head of the pipeline.
    Intake,
    /// First queue consumer, records submitted work.
    Integration,
    /// Binds work to a worker identity.
    Assignment,
    /// Runs the work by job type.
    Execution,
    /// Derives recurring schedules.
    Scheduling,
    /// Derives typed adapters from schedules.
    AdapterConfiguration,
    /// Tail stage, produces terminal queue messages.
    Delivery,
}

impl StageName {
    /// All stages in pipeline order.
    pub const ALL: [Self; 7] = [
        Self::Intake,
        Self::Integration,
        Self::Assignment,
        Self::Execution,
        Self::Scheduling,
        Self::AdapterConfiguration,
        Self::Delivery,
    ];

    /// Kebab-case stage name used in queue names and stats keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Integration => "integration",
            Self::Assignment => "assignment",
            Self::Execution => "execution",
            Self::Scheduling => "scheduling",
            Self::AdapterConfiguration => "adapter-configuration",
            Self::Delivery => "delivery",
        }
    }

    /// 1-based position in the pipeline. Doubles as the execution
    /// record version written at this stage.
    #[must_use]
    pub const fn position(self) -> u32 {
        match self {
            Self::Intake => 1,
            Self::Integration => 2,
            Self::Assignment => 3,
            Self::Execution => 4,
            Self::Scheduling => 5,
            Self::AdapterConfiguration => 6,
            Self::Delivery => 7,
        }
    }

    /// Status a record reaches once this stage has handled it.
    #[must_use]
    pub const fn status(self) -> JobStatus {
        match self {
            Self::Intake => JobStatus::Submitted,
            Self::Integration => JobStatus::Integrated,
            Self::Assignment => JobStatus::Processed,
            Self::Execution => JobStatus::Executed,
            Self::Scheduling => JobStatus::Scheduled,
            Self::AdapterConfiguration => JobStatus::AdapterConfigured,
            Self::Delivery => JobStatus::Delivered,
        }
    }

    /// Uppercase moniker stamped into `processedBy` fields.
    #[must_use]
    pub const fn processed_by(self) -> &'static str {
        match self {
            Self::Intake => "INTAKE",
            Self::Integration => "INTEGRATION",
            Self::Assignment => "ASSIGNMENT",
            Self::Execution => "EXECUTION",
            Self::Scheduling => "SCHEDULING",
            Self::AdapterConfiguration => "ADAPTER-CONFIGURATION",
            Self::Delivery => "DELIVERY",
        }
    }

    /// The queue this stage consumes, if it consumes one.
    ///
    /// Intake has no inbound queue; it is driven by ingress calls.
    #[must_use]
    pub const fn inbound_queue(self) -> Option<&'static str> {
        match self {
            Self::Intake => None,
            Self::Integration => Some("integration-inbound"),
            Self::Assignment => Some("assignment-inbound"),
            Self::Execution => Some("execution-inbound"),
            Self::Scheduling => Some("scheduling-inbound"),
            Self::AdapterConfiguration => Some("adapter-configuration-inbound"),
            Self::Delivery => Some("delivery-inbound"),
        }
    }

    /// The stage after this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Intake => Some(Self::Integration),
            Self::Integration => Some(Self::Assignment),
            Self::Assignment => Some(Self::Execution),
            Self::Execution => Some(Self::Scheduling),
            Self::Scheduling => Some(Self::AdapterConfiguration),
            Self::AdapterConfiguration => Some(Self::Delivery),
            Self::Delivery => None,
        }
    }

    /// Queue this stage forwards into: the next stage's inbound.
    #[must_use]
    pub const fn outbound_queue(self) -> Option<&'static str> {
        match self.next() {
            Some(next) => next.inbound_queue(),
            None => None,
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wiring for one queue consumer.
#[derive(Debug, Clone, Copy)]
pub struct StageRoute {
    /// The stage this route feeds.
    pub stage: StageName,
    /// Queue the consumer long-polls.
    pub inbound: &'static str,
    /// Queue handled records are forwarded to. `None` at the tail.
    pub outbound: Option<&'static str>,
}

/// Consumer routes for the six queue-fed stages, in pipeline order.
#[must_use]
pub fn routes() -> Vec<StageRoute> {
    StageName::ALL
        .iter()
        .filter_map(|stage| {
            stage.inbound_queue().map(|inbound| StageRoute {
                stage: *stage,
                inbound,
                outbound: stage.outbound_queue(),
            })
        })
        .collect()
}
