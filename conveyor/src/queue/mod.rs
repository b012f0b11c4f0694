//! The durable queue every stage consumes from.
//!
//! The queue is an external collaborator behind a trait: at-least-once
//! delivery, long-poll batch receive, and explicit deletion through a
//! one-shot delivery handle. A message received but never deleted
//! reappears after its visibility timeout.

use crate::errors::{ForwardError, ReceiveError};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::time::Duration;

pub mod memory;

pub use memory::MemoryQueueHub;

/// One received message together with its one-shot delivery handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Stable message identity, the same across redeliveries.
    pub id: String,
    /// Raw message body.
    pub body: String,
    /// One-shot delivery handle. Each delivery of the same message gets
    /// a fresh handle; a handle is spent by the first successful delete.
    pub receipt: String,
}

/// A named-queue transport with at-least-once delivery semantics.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DurableQueue: Send + Sync {
    /// Enqueues one message body.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError`] when the queue rejects the message.
    async fn send(&self, queue: &str, body: String) -> Result<(), ForwardError>;

    /// Long-polls for up to `max_messages`, waiting at most `wait` for
    /// the first message before returning an empty batch.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError`] on transport failure.
    async fn receive(
        &self,
        queue: &str,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<QueuedMessage>, ReceiveError>;

    /// Deletes a received message by its delivery handle.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError`] when the handle is unknown, already
    /// spent, or expired.
    async fn delete(&self, queue: &str, receipt: &str) -> Result<(), ReceiveError>;

    /// Number of messages currently visible on a queue.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError`] when the queue cannot be inspected.
    async fn depth(&self, queue: &str) -> Result<usize, ReceiveError>;
}
