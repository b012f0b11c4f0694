//! In-memory queue hub with long-poll receive and visibility timeouts.

use super::{DurableQueue, QueuedMessage};
use crate::errors::{ForwardError, ReceiveError};
use crate::utils::generate_uuid;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct StoredMessage {
    id: String,
    body: String,
}

struct InflightMessage {
    message: StoredMessage,
    taken_at: Instant,
}

struct QueueSlot {
    ready: VecDeque<StoredMessage>,
    inflight: HashMap<String, InflightMessage>,
    notify: Arc<Notify>,
}

impl QueueSlot {
    fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            inflight: HashMap::new(),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Moves claims older than the visibility timeout back to ready.
    fn requeue_expired(&mut self, visibility: Duration) {
        let expired: Vec<String> = self
            .inflight
            .iter()
            .filter(|(_, claim)| claim.taken_at.elapsed() >= visibility)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        for receipt in expired {
            if let Some(claim) = self.inflight.remove(&receipt) {
                self.ready.push_back(claim.message);
            }
        }
    }
}

/// A process-local [`DurableQueue`] over named queues.
///
/// Receives long-poll with immediate wakeup on send. A received message
/// stays invisible until deleted or until the visibility timeout passes,
/// after which it is redelivered under a fresh handle. Queues must be
/// created before use.
pub struct MemoryQueueHub {
    slots: Mutex<HashMap<String, QueueSlot>>,
    visibility: Duration,
}

impl Default for MemoryQueueHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueueHub {
    /// Creates an empty hub with the default 30 second visibility
    /// timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            visibility: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }

    /// Sets the visibility timeout for undeleted claims.
    #[must_use]
    pub fn with_visibility_timeout(mut self, visibility: Duration) -> Self {
        self.visibility = visibility;
        self
    }

    /// Creates a queue. Creating an existing queue is a no-op.
    pub fn create_queue(&self, name: &str) {
        self.slots
            .lock()
            .entry(name.to_string())
            .or_insert_with(QueueSlot::new);
    }

    /// Names of all queues on the hub.
    #[must_use]
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Claims up to `max_messages`, returning the batch and the slot's
    /// notifier for the caller to wait on when the batch is empty.
    fn try_claim(
        &self,
        queue: &str,
        max_messages: usize,
    ) -> Result<(Vec<QueuedMessage>, Arc<Notify>), ReceiveError> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(queue)
            .ok_or_else(|| ReceiveError::new(queue, "queue does not exist"))?;
        slot.requeue_expired(self.visibility);

        let mut batch = Vec::new();
        while batch.len() < max_messages {
            let Some(message) = slot.ready.pop_front() else {
                break;
            };
            let receipt = STANDARD.encode(generate_uuid());
            batch.push(QueuedMessage {
                id: message.id.clone(),
                body: message.body.clone(),
                receipt: receipt.clone(),
            });
            slot.inflight.insert(
                receipt,
                InflightMessage {
                    message,
                    taken_at: Instant::now(),
                },
            );
        }
        Ok((batch, Arc::clone(&slot.notify)))
    }

    fn has_ready(&self, queue: &str) -> bool {
        self.slots
            .lock()
            .get(queue)
            .is_some_and(|slot| !slot.ready.is_empty())
    }
}

#[async_trait]
impl DurableQueue for MemoryQueueHub {
    async fn send(&self, queue: &str, body: String) -> Result<(), ForwardError> {
        let notify = {
            let mut slots = self.slots.lock();
            let slot = slots
                .get_mut(queue)
                .ok_or_else(|| ForwardError::new(queue, "queue does not exist"))?;
            slot.ready.push_back(StoredMessage {
                id: generate_uuid(),
                body,
            });
            Arc::clone(&slot.notify)
        };
        notify.notify_one();
        Ok(())
    }

    async fn receive(
        &self,
        queue: &str,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<QueuedMessage>, ReceiveError> {
        if max_messages == 0 {
            return Ok(Vec::new());
        }
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let (batch, notify) = self.try_claim(queue, max_messages)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(Vec::new());
            }

            // Register interest before the final emptiness check so a
            // send landing in between still wakes this waiter.
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.has_ready(queue) {
                continue;
            }
            let _ = tokio::time::timeout_at(deadline, notified).await;
        }
    }

    async fn delete(&self, queue: &str, receipt: &str) -> Result<(), ReceiveError> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(queue)
            .ok_or_else(|| ReceiveError::new(queue, "queue does not exist"))?;
        if slot.inflight.remove(receipt).is_some() {
            Ok(())
        } else {
            Err(ReceiveError::new(
                queue,
                "unknown or expired delivery handle",
            ))
        }
    }

    async fn depth(&self, queue: &str) -> Result<usize, ReceiveError> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(queue)
            .ok_or_else(|| ReceiveError::new(queue, "queue does not exist"))?;
        slot.requeue_expired(self.visibility);
        Ok(slot.ready.len())
    }
}
