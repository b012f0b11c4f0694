//! Error types for the conveyor relay pipeline.
//!
//! Stage handlers and backends return these errors to the consumer loop,
//! which turns them into deletion-policy decisions and structured logs.
//! A stage error never propagates beyond its own loop iteration.

use thiserror::Error;

/// The main error type for conveyor operations.
#[derive(Debug, Error)]
pub enum ConveyorError {
    /// An inbound message body could not be decoded.
    #[error("{0}")]
    Decode(#[from] DecodeError),

    /// A state store read or write failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Forwarding a message to the next stage's queue failed.
    #[error("{0}")]
    Forward(#[from] ForwardError),

    /// An operation on a stage's inbound queue failed.
    #[error("{0}")]
    Receive(#[from] ReceiveError),

    /// A stop request presented a correlation UUID that does not match
    /// the stored execution record.
    #[error("{0}")]
    IdentityMismatch(#[from] IdentityMismatchError),

    /// The referenced execution record does not exist.
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    /// An ingress request failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error raised when a message body cannot be decoded into any known
/// payload shape. Such messages are poison: logged and dropped, never
/// retried or forwarded.
#[derive(Debug, Clone, Error)]
#[error("Undecodable message on stage '{stage}': {reason}")]
pub struct DecodeError {
    /// The stage that received the message.
    pub stage: String,
    /// Why the decode failed.
    pub reason: String,
}

impl DecodeError {
    /// Creates a new decode error.
    #[must_use]
    pub fn new(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

/// Error raised when a state store operation fails.
#[derive(Debug, Clone, Error)]
#[error("Store operation failed for {table}/{key}: {message}")]
pub struct StoreError {
    /// The logical table involved.
    pub table: String,
    /// The record key involved.
    pub key: String,
    /// What went wrong.
    pub message: String,
}

impl StoreError {
    /// Creates a new store error.
    #[must_use]
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            message: "operation failed".to_string(),
        }
    }

    /// Sets the failure message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Error raised when sending to the next stage's queue fails.
#[derive(Debug, Clone, Error)]
#[error("Forward to queue '{queue}' failed: {message}")]
pub struct ForwardError {
    /// The outbound queue name.
    pub queue: String,
    /// What went wrong.
    pub message: String,
}

impl ForwardError {
    /// Creates a new forward error.
    #[must_use]
    pub fn new(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a receive or delete on a stage's inbound queue
/// fails. A receive failure makes the consumer loop log and back off; a
/// delete failure is only logged. Neither is fatal.
#[derive(Debug, Clone, Error)]
#[error("Inbound queue '{queue}' operation failed: {message}")]
pub struct ReceiveError {
    /// The inbound queue name.
    pub queue: String,
    /// What went wrong.
    pub message: String,
}

impl ReceiveError {
    /// Creates a new receive error.
    #[must_use]
    pub fn new(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a stop request's correlation UUID does not match the
/// one stored on the execution's intake record.
#[derive(Debug, Clone, Error)]
#[error("Execution UUID mismatch")]
pub struct IdentityMismatchError {
    /// The logical execution name the request referenced.
    pub execution_name: String,
    /// The UUID the caller presented.
    pub presented: String,
}

impl IdentityMismatchError {
    /// Creates a new identity mismatch error.
    #[must_use]
    pub fn new(execution_name: impl Into<String>, presented: impl Into<String>) -> Self {
        Self {
            execution_name: execution_name.into(),
            presented: presented.into(),
        }
    }
}
