//! `lease-server` daemon entry point.
//!
//! Loads configuration, starts the lease reaper across the configured
//! workspaces, spawns a logging watcher per event sink, and serves the
//! small operational HTTP surface (`/healthz`, `/readyz`) with graceful
//! shutdown.

mod config;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lease_core::{Event, EventHandler, LeaseExpiryContract, LeaseReaper, RetryPolicy, StreamOffset, Watcher, WatcherError};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(redis_url = %config.redis_url, workspaces = config.workspaces.len(), "lease-server starting");

    let reaper = Arc::new(
        LeaseReaper::new(config.redis_url.clone(), config.polling_timeout, config.idling_timeout).with_retry_policy(
            RetryPolicy::from_config(config.max_retries, config.min_retry_backoff_ms, config.max_retry_backoff_ms),
        ),
    );
    reaper.init().await;

    let contracts = config
        .workspaces
        .iter()
        .map(|w| LeaseExpiryContract::new(w.workspace.clone(), w.event_sink.clone(), w.max_in_flight));
    reaper
        .add_expiry_contracts(contracts)
        .await
        .context("failed to register expiry contracts")?;

    reaper.start().await.context("failed to start lease reaper")?;

    let watchers = start_watchers(&config).await?;

    let state = Arc::new(AppState::new(Arc::clone(&reaper)));
    state.mark_ready();

    let app = routes::build_router(Arc::clone(&state));
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "lease-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down");
    reaper.stop().await;
    for watcher in watchers {
        watcher.close().await;
    }
    info!("lease-server stopped");

    Ok(())
}

async fn start_watchers(config: &Config) -> anyhow::Result<Vec<Arc<Watcher>>> {
    let mut watchers = Vec::with_capacity(config.workspaces.len());

    for w in &config.workspaces {
        let watcher = Arc::new(Watcher::new(
            "lease-server",
            hostname(),
            config.redis_url.clone(),
            64,
            Duration::from_secs(5),
            Duration::from_secs(30),
            16,
            20,
            Arc::new(LoggingEventHandler {
                workspace: w.workspace.clone(),
            }),
        ));

        Arc::clone(&watcher)
            .subscribe(vec![StreamOffset::latest(w.event_sink.clone())])
            .await
            .with_context(|| format!("failed to subscribe watcher for workspace '{}'", w.workspace))?;

        watchers.push(watcher);
    }

    Ok(watchers)
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "lease-server".to_owned())
}

struct LoggingEventHandler {
    workspace: String,
}

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle(&self, event: &Event) -> Result<(), WatcherError> {
        info!(
            workspace = %self.workspace,
            lease = %event.lease_id,
            action = %event.action,
            expire_at = %event.expire_at,
            "lease expired"
        );
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    warn!("shutdown signal received");
}
