//! linkpeek server entry point.
//!
//! Boots the link-check pipeline and serves the queue view as MCP tools on
//! stdio transport. Logging goes to stderr to avoid interfering with the
//! JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use linkpeek_client::{Correlator, FetchClient, FetchConfig, LinkQueue, PreviewConfig, PreviewRecorder, Scheduler};
use linkpeek_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    let queue = LinkQueue::new(db, config.cache_ttl());

    let recorder = PreviewRecorder::new(queue.clone(), PreviewConfig::new(config.preview_properties.iter().cloned()));
    let correlator = Correlator::new(queue.clone()).with_listener(Arc::new(recorder));
    let fetcher = FetchClient::new(FetchConfig::from(&config))?;
    let scheduler = Arc::new(
        Scheduler::new(queue.clone(), Arc::new(fetcher), Arc::new(correlator), config.sweep_interval())
            .with_max_concurrency(config.max_concurrency),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run(shutdown_rx).await }
    });

    tracing::info!(
        db_path = %config.db_path.display(),
        sweep_interval_secs = config.sweep_interval_secs,
        max_concurrency = config.max_concurrency,
        "Starting linkpeek server on stdio transport"
    );

    let handler = handler::LinkPeekServer::new(queue);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    let outcome = tokio::select! {
        quit = server.waiting() => quit.map(|_| ()).context("MCP service stopped with an error"),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            Ok(())
        }
    };

    if let Err(e) = shutdown_tx.send(true) {
        tracing::debug!(error = %e, "scheduler already stopped");
    }
    sweeper.await?;
    scheduler.settle().await;

    outcome
}
