//! Delivery stage, the pipeline tail.
//!
//! Adapters become terminal queue messages that settle from pending to
//! delivered a moment after creation. Settle tasks are tracked so
//! shutdown can join them instead of orphaning half-written records.

use super::{relay_execution, unexpected_variant, StageContext, StageHandler};
use crate::errors::ConveyorError;
use crate::records::{ExecutionRecord, QueueMessage, RelayMessage};
use crate::store::{StateStore, Table};
use crate::topology::StageName;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const STAGE: StageName = StageName::Delivery;

/// Registry of in-flight settle tasks.
#[derive(Debug, Default)]
pub struct DeliveryTracker {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DeliveryTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one settle task.
    pub fn track(&self, handle: JoinHandle<()>) {
        self.handles.lock().push(handle);
    }

    /// Number of tasks registered and not yet drained.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.handles.lock().len()
    }

    /// Joins every registered task. A panicked task is logged, not
    /// propagated.
    pub async fn drain(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        for outcome in futures::future::join_all(handles).await {
            if let Err(err) = outcome {
                warn!(error = %err, "settle task panicked");
            }
        }
    }
}

/// Turns adapters into terminal queue messages and writes the final
/// execution version.
pub struct DeliveryHandler {
    tracker: Arc<DeliveryTracker>,
    settle_delay: Duration,
}

impl DeliveryHandler {
    /// Creates the handler with the shared settle-task tracker.
    #[must_use]
    pub fn new(tracker: Arc<DeliveryTracker>) -> Self {
        Self {
            tracker,
            settle_delay: Duration::from_millis(500),
        }
    }

    /// Time between creating a queue message and settling it.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    fn spawn_settle(&self, store: Arc<dyn StateStore>, adapter_id: String, mut message: QueueMessage) {
        let delay = self.settle_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            message.mark_delivered();
            match serde_json::to_value(&message) {
                Ok(value) => {
                    if let Err(err) = store.put(Table::QueueMessages, &adapter_id, value).await {
                        warn!(
                            adapter_id = %adapter_id,
                            error = %err,
                            "queue message settle write failed"
                        );
                    }
                }
                Err(err) => {
                    warn!(adapter_id = %adapter_id, error = %err, "queue message settle failed");
                }
            }
        });
        self.tracker.track(handle);
    }
}

#[async_trait]
impl StageHandler for DeliveryHandler {
    fn name(&self) -> &'static str {
        STAGE.as_str()
    }

    async fn handle(&self, context: &StageContext, body: &str) -> Result<(), ConveyorError> {
        match RelayMessage::decode(self.name(), body)? {
            RelayMessage::Adapter(adapter) => {
                let stored = context
                    .store()
                    .get(Table::QueueMessages, &adapter.id)
                    .await?;
                if stored.is_some() {
                    debug!(adapter_id = %adapter.id, "queue message already derived");
                    return Ok(());
                }
                let message = QueueMessage::for_adapter(&adapter);
                context
                    .store()
                    .put(
                        Table::QueueMessages,
                        &adapter.id,
                        serde_json::to_value(&message)?,
                    )
                    .await?;
                info!(
                    adapter_id = %adapter.id,
                    message_id = %message.id,
                    priority = message.priority,
                    "queue message created"
                );
                self.spawn_settle(Arc::clone(context.store()), adapter.id, message);
                Ok(())
            }
            RelayMessage::Execution(request) => {
                let record = ExecutionRecord::for_stage(
                    &request,
                    STAGE.as_str(),
                    STAGE.processed_by(),
                    STAGE.position(),
                    STAGE.status(),
                );
                relay_execution(context, &request, record).await
            }
            other => Err(unexpected_variant(STAGE, &other).into()),
        }
    }
}
