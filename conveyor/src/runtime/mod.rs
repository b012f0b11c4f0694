//! Pipeline assembly and lifecycle.
//!
//! [`PipelineRuntime::start`] spawns one consumer per queue-fed stage
//! over shared backends and hands back the ingress facade, an observer,
//! and the shutdown path. Must be called inside a tokio runtime.

use crate::cancellation::{CancellationToken, StageTaskGroup};
use crate::consumer::{ConsumerConfig, StageConsumer};
use crate::ingress::Ingress;
use crate::observability::{RecentCache, StatsRegistry};
use crate::queue::DurableQueue;
use crate::stages::{
    AdapterConfigurationHandler, AssignmentHandler, DeliveryHandler, DeliveryTracker,
    ExecutionHandler, IntegrationHandler, SchedulingHandler, StageContext, StageHandler,
};
use crate::store::StateStore;
use crate::topology::{routes, StageName};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;


const RECENT_LIMIT: usize = 16;

/// Tuning for the whole pipeline.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Per-consumer loop tuning.
    pub consumer: ConsumerConfig,
    /// Simulated per-job time at the assignment stage.
    pub processing_delay: Duration,
    /// Time between creating a terminal queue message and settling it.
    pub settle_delay: Duration,
    /// Capacity of the recent-record cache.
    pub cache_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            consumer: ConsumerConfig::default(),
            processing_delay: Duration::ZERO,
            settle_delay: Duration::from_millis(500),
            cache_capacity: 256,
        }
    }
}

impl RelayConfig {
    /// Sets the consumer loop tuning.
    #[must_use]
    pub fn with_consumer(mut self, consumer: ConsumerConfig) -> Self {
        self.consumer = consumer;
        self
    }

    /// Sets the assignment stage's simulated processing time.
    #[must_use]
    pub fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = delay;
        self
    }

    /// Sets the delivery settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the recent-record cache capacity.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

/// The assembled pipeline: six consumers over shared backends.
pub struct PipelineRuntime {
    store: Arc<dyn StateStore>,
    queue: Arc<dyn DurableQueue>,
    registry: Arc<StatsRegistry>,
    cache: Arc<RecentCache>,
    tracker: Arc<DeliveryTracker>,
    group: StageTaskGroup,
}

impl PipelineRuntime {
    /// Spawns every stage consumer and returns the running pipeline.
    #[must_use]
    pub fn start(
        store: Arc<dyn StateStore>,
        queue: Arc<dyn DurableQueue>,
        config: RelayConfig,
    ) -> Self {
        let registry = Arc::new(StatsRegistry::new());
        let cache = Arc::new(RecentCache::new(config.cache_capacity));
        let tracker = Arc::new(DeliveryTracker::new());
        let group = StageTaskGroup::new();

        for route in routes() {
            let Some(handler) = Self::handler_for(route.stage, &config, &tracker) else {
                continue;
            };
            let stats = registry.register(route.stage.as_str(), &handler.identity());
            let context = Arc::new(StageContext::new(
                route.stage,
                Arc::clone(&store),
                Arc::clone(&queue),
                route.outbound.map(str::to_string),
                stats,
                Arc::clone(&cache),
            ));
            let consumer =
                StageConsumer::new(context, handler, route.inbound, config.consumer.clone());
            group.spawn(route.stage.as_str(), move |token| consumer.run(token));
        }
        info!(consumers = group.task_count(), "pipeline started");

        Self {
            store,
            queue,
            registry,
            cache,
            tracker,
            group,
        }
    }

    fn handler_for(
        stage: StageName,
        config: &RelayConfig,
        tracker: &Arc<DeliveryTracker>,
    ) -> Option<Arc<dyn StageHandler>> {
        match stage {
            StageName::Intake => None,
            StageName::Integration => Some(Arc::new(IntegrationHandler::new())),
            StageName::Assignment => Some(Arc::new(
                AssignmentHandler::new().with_processing_delay(config.processing_delay),
            )),
            StageName::Execution => Some(Arc::new(ExecutionHandler::new())),
            StageName::Scheduling => Some(Arc::new(SchedulingHandler::new())),
            StageName::AdapterConfiguration => {
                Some(Arc::new(AdapterConfigurationHandler::new()))
            }
            StageName::Delivery => Some(Arc::new(
                DeliveryHandler::new(Arc::clone(tracker)).with_settle_delay(config.settle_delay),
            )),
        }
    }

    /// The ingress facade feeding this pipeline.
    #[must_use]
    pub fn ingress(&self) -> Ingress {
        Ingress::new(
            Arc::clone(&self.store),
            Arc::clone(&self.queue),
            Arc::clone(&self.cache),
        )
    }

    /// A read-only view over counters, recent records, and queue depths.
    #[must_use]
    pub fn observer(&self) -> PipelineObserver {
        PipelineObserver {
            registry: Arc::clone(&self.registry),
            cache: Arc::clone(&self.cache),
            queue: Arc::clone(&self.queue),
        }
    }

    /// The token cancelling every consumer.
    #[must_use]
    pub fn token(&self) -> Arc<CancellationToken> {
        self.group.token()
    }

    /// Cancels every consumer, joins them, then drains pending settle
    /// tasks so no half-written record is left behind.
    ///
    /// # Errors
    ///
    /// Returns the first consumer failure or panic message.
    pub async fn shutdown(self, reason: &str) -> Result<(), String> {
        info!(reason = %reason, "pipeline shutting down");
        self.group.cancel_all(reason);
        let outcome = self.group.wait().await;
        self.tracker.drain().await;
        info!("pipeline stopped");
        outcome
    }
}

/// Cloneable read-only view handed to the HTTP surface.
#[derive(Clone)]
pub struct PipelineObserver {
    registry: Arc<StatsRegistry>,
    cache: Arc<RecentCache>,
    queue: Arc<dyn DurableQueue>,
}

impl PipelineObserver {
    /// Point-in-time snapshot of stage counters, queue depths, and the
    /// most recent records.
    pub async fn snapshot(&self) -> Value {
        let mut queues = Map::new();
        for route in routes() {
            let depth = self.queue.depth(route.inbound).await.unwrap_or(0);
            queues.insert(route.inbound.to_string(), json!(depth));
        }
        json!({
            "stages": self.registry.snapshot(),
            "queues": queues,
            "recent": self.cache.recent(RECENT_LIMIT),
        })
    }
}
