//! Binary entry point: in-memory backends, the relay pipeline, and the
//! HTTP front door, wired for graceful shutdown.

mod api;

use anyhow::Context;
use api::AppState;
use conveyor::consumer::{ConsumerConfig, DeletePolicy};
use conveyor::queue::{DurableQueue, MemoryQueueHub};
use conveyor::runtime::{PipelineRuntime, RelayConfig};
use conveyor::store::{MemoryStore, StateStore};
use conveyor::topology::routes;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,conveyor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting conveyor gateway...");

    let config = config_from_env()?;

    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let hub = MemoryQueueHub::new();
    for route in routes() {
        hub.create_queue(route.inbound);
    }
    let queue: Arc<dyn DurableQueue> = Arc::new(hub);

    let runtime = PipelineRuntime::start(Arc::clone(&store), Arc::clone(&queue), config);
    let app = api::create_router(AppState {
        ingress: runtime.ingress(),
        observer: runtime.observer(),
    });

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    runtime
        .shutdown("shutdown signal received")
        .await
        .map_err(|err| anyhow::anyhow!(err))?;
    Ok(())
}

/// Pipeline tuning from the environment. Every knob has a default.
fn config_from_env() -> anyhow::Result<RelayConfig> {
    let mut consumer = ConsumerConfig::default();
    if let Ok(raw) = std::env::var("DELETE_POLICY") {
        let policy = match raw.as_str() {
            "always" => DeletePolicy::Always,
            "on-success" => DeletePolicy::OnSuccess,
            other => anyhow::bail!("unknown DELETE_POLICY '{other}'"),
        };
        consumer = consumer.with_delete_policy(policy);
    }

    let mut config = RelayConfig::default().with_consumer(consumer);
    if let Some(delay) = millis_from_env("PROCESSING_DELAY_MS")? {
        config = config.with_processing_delay(delay);
    }
    if let Some(delay) = millis_from_env("DELIVERY_SETTLE_MS")? {
        config = config.with_settle_delay(delay);
    }
    if let Ok(raw) = std::env::var("CACHE_CAPACITY") {
        let capacity = raw.parse().context("CACHE_CAPACITY must be a number")?;
        config = config.with_cache_capacity(capacity);
    }
    Ok(config)
}

fn millis_from_env(name: &str) -> anyhow::Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => {
            let millis: u64 = raw
                .parse()
                .with_context(|| format!("{name} must be milliseconds"))?;
            Ok(Some(Duration::from_millis(millis)))
        }
        Err(_) => Ok(None),
    }
}

/// Resolves when the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "sigterm handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
