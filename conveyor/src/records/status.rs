//! The job status state machine shared by job records, execution
//! records, and artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of a unit of work as it travels through the pipeline.
///
/// The first seven values form a strict forward chain, one transition per
/// stage. `Stopped` sits outside the chain: it is terminal, reachable only
/// through the synchronous stop operation, and has no rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    /// Accepted by intake, not yet picked up by any stage.
    Submitted,
    /// The integration stage has recorded the work.
    Integrated,
    /// The assignment stage has bound the work to a worker.
    Processed,
    /// The execution stage has run the work.
    Executed,
    /// The scheduling stage has derived a schedule.
    Scheduled,
    /// The adapter-configuration stage has derived an adapter.
    AdapterConfigured,
    /// The delivery stage has enqueued the final queue message.
    Delivered,
    /// Stopped by an operator request. Terminal, outside the chain.
    Stopped,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Submitted
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Integrated => write!(f, "integrated"),
            Self::Processed => write!(f, "processed"),
            Self::Executed => write!(f, "executed"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::AdapterConfigured => write!(f, "adapter-configured"),
            Self::Delivered => write!(f, "delivered"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl JobStatus {
    /// Position of this status in the forward chain, 1-based.
    /// `Stopped` has no position.
    #[must_use]
    pub fn rank(&self) -> Option<u32> {
        match self {
            Self::Submitted => Some(1),
            Self::Integrated => Some(2),
            Self::Processed => Some(3),
            Self::Executed => Some(4),
            Self::Scheduled => Some(5),
            Self::AdapterConfigured => Some(6),
            Self::Delivered => Some(7),
            Self::Stopped => None,
        }
    }

    /// The status at a given 1-based pipeline position.
    #[must_use]
    pub fn at_rank(rank: u32) -> Option<Self> {
        match rank {
            1 => Some(Self::Submitted),
            2 => Some(Self::Integrated),
            3 => Some(Self::Processed),
            4 => Some(Self::Executed),
            5 => Some(Self::Scheduled),
            6 => Some(Self::AdapterConfigured),
            7 => Some(Self::Delivered),
            _ => None,
        }
    }

    /// Returns true if writing `self` over `prior` moves the chain
    /// forward. Equal or earlier statuses do not advance, which is what
    /// makes a duplicate delivery's second write a no-op.
    #[must_use]
    pub fn advances(&self, prior: &Self) -> bool {
        match (self.rank(), prior.rank()) {
            (Some(new), Some(old)) => new > old,
            _ => false,
        }
    }

    /// Returns true if the status permits no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Stopped)
    }
}
