//! Skill Matrix Server
//!
//! Ingestion settings (`UPLOAD_LIMIT`, `JOB_TIMEOUT_SECS`, `QUEUE_NAME`,
//! `DISPATCH_MODE`, `SCHEMA_CHECK`, `QUEUE_MAX_CONNECTIONS`) come from the
//! environment; server settings from flags or their environment fallbacks.

use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use skillmatrix_ingest::{IngestConfig, WorkerSettings};
use skillmatrix_server::{create_router, AppState};

/// Skill-matrix user ingestion server.
#[derive(Parser, Debug)]
#[command(name = "skillmatrix-server", about = "Skill-matrix user ingestion server")]
struct Args {
    /// HTTP server address
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:3000")]
    http_addr: String,

    /// Number of persistence workers
    #[arg(long, env = "WORKER_CONCURRENCY", default_value_t = 4)]
    worker_concurrency: usize,

    /// Artificial delay per persisted record, in milliseconds
    #[arg(long, env = "WORKER_DELAY_MS", default_value_t = 0)]
    worker_delay_ms: u64,

    /// Jobs buffered in the queue before dispatch waits
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 256)]
    queue_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("skillmatrix=info".parse()?))
        .with_target(true)
        .init();

    // Load config, failing fast on bad values
    let config = IngestConfig::from_env()?;
    config.validate()?;

    info!(
        http_addr = %args.http_addr,
        max_chunk_size = config.max_chunk_size,
        job_timeout_secs = config.job_timeout.as_secs(),
        queue = %config.queue_name,
        dispatch_mode = ?config.dispatch_mode,
        schema_check = ?config.schema_check,
        "Starting skill-matrix server"
    );

    let workers = WorkerSettings {
        concurrency: args.worker_concurrency,
        record_delay: Duration::from_millis(args.worker_delay_ms),
    };
    let (state, worker_pool) = AppState::start(config, workers, args.queue_capacity);

    let router = create_router(state.clone());
    let listener = TcpListener::bind(&args.http_addr).await?;
    info!("HTTP server listening on {}", args.http_addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "HTTP server error");
    }

    // Stop the queue, then let workers drain what was already submitted
    state.shutdown().await;
    worker_pool.join().await;

    info!("Skill-matrix server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
