pub mod api;
pub mod background;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod state;

use crate::background::{shutdown_signal, start_scheduler_loop};
use crate::config::Config;
use crate::infra::factory::bootstrap_state;
use api::router::create_router;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Pretty stdout filtered by `RUST_LOG`, plus a daily JSON file under `./logs`.
/// Keep the guard alive for as long as logs should be flushed.
pub fn init_logging() -> WorkerGuard {
    let (json_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily("./logs", "tatkal-engine.log"));

    let console = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    let json_file = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(json_writer)
        .with_filter(EnvFilter::new("info,tatkal_engine=debug,sqlx=warn"));

    tracing_subscriber::registry().with(console).with(json_file).init();

    info!("Logging initialized. JSON logs go to ./logs/tatkal-engine.log");
    guard
}

/// Process entry point: stores, the tick loop and the trigger surface.
/// Shuts down on Ctrl+C or SIGTERM once the in-flight tick has finished.
pub async fn run() {
    let _guard = init_logging();

    let config = Config::from_env();
    info!(
        timezone = %config.engine.timezone,
        max_concurrent_jobs = config.engine.max_concurrent_jobs,
        scan_limit = config.engine.scan_limit,
        "Configuration loaded"
    );

    let state = Arc::new(bootstrap_state(&config).await);

    let (stop_tx, stop_rx) = watch::channel(false);
    let scheduler_loop = tokio::spawn(start_scheduler_loop(state.clone(), stop_rx));

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind port {}: {}", config.port, e);
            let _ = stop_tx.send(true);
            let _ = scheduler_loop.await;
            return;
        }
    };

    info!("Trigger surface listening on port {}", config.port);
    if let Err(e) = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    let _ = stop_tx.send(true);
    if let Err(e) = scheduler_loop.await {
        error!("Scheduler loop ended abnormally: {}", e);
    }
    info!("Shutdown complete");
}
