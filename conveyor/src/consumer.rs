//! The long-poll consumer loop every queue-fed stage runs.
//!
//! One loop iteration receives a batch, dispatches each message to the
//! stage handler in order, and resolves each outcome through the
//! deletion policy. A started batch always finishes; cancellation is
//! observed between receives. Receive failures back off a fixed pause
//! and the loop carries on.

use crate::cancellation::CancellationToken;
use crate::errors::ConveyorError;
use crate::queue::QueuedMessage;
use crate::stages::{StageContext, StageHandler};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What to do with a message whose handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Delete only after successful handling. Failed messages stay on
    /// the queue and reappear after the visibility timeout.
    #[default]
    OnSuccess,
    /// Delete regardless of the handler outcome.
    Always,
}

/// Tuning for one stage consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Long-poll wait per receive call.
    pub wait: Duration,
    /// Most messages taken per receive.
    pub batch_size: usize,
    /// Pause after a failed receive.
    pub backoff: Duration,
    /// Resolution for handler failures.
    pub delete_policy: DeletePolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(20),
            batch_size: 10,
            backoff: Duration::from_secs(5),
            delete_policy: DeletePolicy::OnSuccess,
        }
    }
}

impl ConsumerConfig {
    /// Sets the long-poll wait.
    #[must_use]
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the receive-failure backoff.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the deletion policy for handler failures.
    #[must_use]
    pub fn with_delete_policy(mut self, delete_policy: DeletePolicy) -> Self {
        self.delete_policy = delete_policy;
        self
    }
}

/// One stage's consume loop over its inbound queue.
pub struct StageConsumer {
    context: Arc<StageContext>,
    handler: Arc<dyn StageHandler>,
    inbound: String,
    config: ConsumerConfig,
}

impl StageConsumer {
    /// Wires a consumer to its queue and handler.
    #[must_use]
    pub fn new(
        context: Arc<StageContext>,
        handler: Arc<dyn StageHandler>,
        inbound: impl Into<String>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            context,
            handler,
            inbound: inbound.into(),
            config,
        }
    }

    /// Runs until the token is cancelled. Message-level failures never
    /// end the loop; the returned result reports only the loop's own
    /// lifecycle.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; the signature matches what the
    /// task group joins.
    pub async fn run(self, token: Arc<CancellationToken>) -> Result<(), String> {
        info!(stage = %self.handler.name(), queue = %self.inbound, "consumer started");
        loop {
            if token.is_cancelled() {
                break;
            }
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                received = self.context.queue().receive(
                    &self.inbound,
                    self.config.batch_size,
                    self.config.wait,
                ) => match received {
                    Ok(batch) => {
                        for message in batch {
                            self.dispatch(message).await;
                        }
                    }
                    Err(err) => {
                        warn!(
                            stage = %self.handler.name(),
                            error = %err,
                            "receive failed, backing off"
                        );
                        tokio::select! {
                            biased;
                            () = token.cancelled() => break,
                            () = tokio::time::sleep(self.config.backoff) => {}
                        }
                    }
                },
            }
        }
        info!(stage = %self.handler.name(), "consumer stopped");
        Ok(())
    }

    async fn dispatch(&self, message: QueuedMessage) {
        match self.handler.handle(&self.context, &message.body).await {
            Ok(()) => {
                self.context.stats().record_processed();
                self.context
                    .cache()
                    .record(self.handler.name(), &message.id, &message.body);
                self.delete(&message).await;
            }
            Err(ConveyorError::Decode(err)) => {
                warn!(
                    stage = %self.handler.name(),
                    message_id = %message.id,
                    error = %err,
                    "dropping undecodable message"
                );
                self.context.stats().record_dropped();
                // Poison never comes back, whatever the policy.
                self.delete(&message).await;
            }
            Err(err) => {
                self.context.stats().record_failure();
                warn!(
                    stage = %self.handler.name(),
                    message_id = %message.id,
                    error = %err,
                    "handler failed"
                );
                if self.config.delete_policy == DeletePolicy::Always {
                    self.delete(&message).await;
                }
            }
        }
    }

    async fn delete(&self, message: &QueuedMessage) {
        if let Err(err) = self
            .context
            .queue()
            .delete(&self.inbound, &message.receipt)
            .await
        {
            warn!(
                stage = %self.handler.name(),
                message_id = %message.id,
                error = %err,
                "delete failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DecodeError, ReceiveError};
    use crate::observability::{RecentCache, StageStats};
    use crate::queue::{DurableQueue, MemoryQueueHub, MockDurableQueue};
    use crate::stages::StageContext;
    use crate::store::MemoryStore;
    use crate::topology::StageName;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const QUEUE: &str = "integration-inbound";

    #[derive(Clone, Copy)]
    enum Mode {
        Succeed,
        Fail,
        DropMarked,
    }

    struct ScriptedHandler {
        mode: Mode,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StageHandler for ScriptedHandler {
        fn name(&self) -> &'static str {
            "integration"
        }

        async fn handle(&self, _context: &StageContext, body: &str) -> Result<(), ConveyorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Succeed => Ok(()),
                Mode::Fail => Err(ConveyorError::InvalidRequest("scripted failure".to_string())),
                Mode::DropMarked => {
                    if body.contains("poison") {
                        Err(DecodeError::new("integration", "marked poison").into())
                    } else {
                        Ok(())
                    }
                }
            }
        }
    }

    fn context_over(queue: Arc<dyn DurableQueue>) -> Arc<StageContext> {
        Arc::new(StageContext::new(
            StageName::Integration,
            Arc::new(MemoryStore::new()),
            queue,
            None,
            Arc::new(StageStats::new("integration", "integration")),
            Arc::new(RecentCache::new(16)),
        ))
    }

    struct Rig {
        queue: Arc<MemoryQueueHub>,
        context: Arc<StageContext>,
        calls: Arc<AtomicUsize>,
        consumer: StageConsumer,
    }

    fn rig(mode: Mode, policy: DeletePolicy, visibility: Duration) -> Rig {
        let queue = Arc::new(MemoryQueueHub::new().with_visibility_timeout(visibility));
        queue.create_queue(QUEUE);
        let context = context_over(Arc::clone(&queue) as Arc<dyn DurableQueue>);
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(ScriptedHandler {
            mode,
            calls: Arc::clone(&calls),
        });
        let config = ConsumerConfig::default()
            .with_wait(Duration::from_millis(10))
            .with_backoff(Duration::from_millis(10))
            .with_delete_policy(policy);
        let consumer = StageConsumer::new(Arc::clone(&context), handler, QUEUE, config);
        Rig {
            queue,
            context,
            calls,
            consumer,
        }
    }

    async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !check() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {what}"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_success_deletes_and_counts() {
        let rig = rig(Mode::Succeed, DeletePolicy::OnSuccess, Duration::from_millis(30));
        rig.queue.send(QUEUE, "{}".to_string()).await.unwrap();

        let token = Arc::new(CancellationToken::new());
        let running = tokio::spawn(rig.consumer.run(Arc::clone(&token)));

        let stats = Arc::clone(rig.context.stats());
        wait_until("first message processed", || stats.processed() == 1).await;

        // Past the visibility window: a deleted message never comes back.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(rig.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rig.queue.depth(QUEUE).await.unwrap(), 0);
        assert!(!rig.context.cache().is_empty());

        token.cancel("test finished");
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failed_message_reappears_under_on_success() {
        let rig = rig(Mode::Fail, DeletePolicy::OnSuccess, Duration::from_millis(25));
        rig.queue.send(QUEUE, "{}".to_string()).await.unwrap();

        let token = Arc::new(CancellationToken::new());
        let running = tokio::spawn(rig.consumer.run(Arc::clone(&token)));

        let stats = Arc::clone(rig.context.stats());
        wait_until("message redelivered after failure", || stats.failed() >= 2).await;
        assert_eq!(stats.processed(), 0);

        token.cancel("test finished");
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failed_message_is_spent_under_always() {
        let rig = rig(Mode::Fail, DeletePolicy::Always, Duration::from_millis(25));
        rig.queue.send(QUEUE, "{}".to_string()).await.unwrap();

        let token = Arc::new(CancellationToken::new());
        let running = tokio::spawn(rig.consumer.run(Arc::clone(&token)));

        let stats = Arc::clone(rig.context.stats());
        wait_until("single failure recorded", || stats.failed() == 1).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(stats.failed(), 1);
        assert_eq!(rig.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rig.queue.depth(QUEUE).await.unwrap(), 0);

        token.cancel("test finished");
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_poison_is_dropped_once_under_either_policy() {
        let rig = rig(
            Mode::DropMarked,
            DeletePolicy::OnSuccess,
            Duration::from_millis(25),
        );
        rig.queue
            .send(QUEUE, "poison marker".to_string())
            .await
            .unwrap();

        let token = Arc::new(CancellationToken::new());
        let running = tokio::spawn(rig.consumer.run(Arc::clone(&token)));

        let stats = Arc::clone(rig.context.stats());
        wait_until("poison dropped", || stats.dropped() == 1).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(stats.dropped(), 1);
        assert_eq!(stats.processed(), 0);
        assert_eq!(rig.calls.load(Ordering::SeqCst), 1);

        token.cancel("test finished");
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_poison_does_not_block_the_rest_of_the_batch() {
        let rig = rig(
            Mode::DropMarked,
            DeletePolicy::OnSuccess,
            Duration::from_millis(200),
        );
        rig.queue
            .send(QUEUE, "poison marker".to_string())
            .await
            .unwrap();
        rig.queue.send(QUEUE, "{}".to_string()).await.unwrap();

        let token = Arc::new(CancellationToken::new());
        let running = tokio::spawn(rig.consumer.run(Arc::clone(&token)));

        let stats = Arc::clone(rig.context.stats());
        wait_until("batch fully dispatched", || {
            stats.dropped() == 1 && stats.processed() == 1
        })
        .await;

        token.cancel("test finished");
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_receive_failure_backs_off_and_retries() {
        let receives = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&receives);
        let mut mock = MockDurableQueue::new();
        mock.expect_receive().returning(move |queue, _, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(ReceiveError::new(queue, "transport down"))
        });

        let context = context_over(Arc::new(mock));
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(ScriptedHandler {
            mode: Mode::Succeed,
            calls: Arc::clone(&calls),
        });
        let config = ConsumerConfig::default()
            .with_wait(Duration::from_millis(5))
            .with_backoff(Duration::from_millis(10));
        let consumer = StageConsumer::new(Arc::clone(&context), handler, QUEUE, config);

        let token = Arc::new(CancellationToken::new());
        let running = tokio::spawn(consumer.run(Arc::clone(&token)));

        let watched = Arc::clone(&receives);
        wait_until("loop kept retrying", || watched.load(Ordering::SeqCst) >= 3).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        token.cancel("test finished");
        running.await.unwrap().unwrap();
    }
}
