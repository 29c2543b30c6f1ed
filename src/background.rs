use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use crate::state::AppState;

/// Runs a scheduler tick every `scan_interval` until `shutdown` flips to true.
/// A tick that is already running is allowed to finish; failed ticks are logged
/// and the next tick rescans from the store.
pub async fn start_scheduler_loop(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    info!(
        "Starting scheduler loop (interval {}s)...",
        state.config.scan_interval.as_secs()
    );

    let mut ticker = interval(state.config.scan_interval);
    // A tick that overruns the interval does not queue a burst of catch-up ticks.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        match state.scheduler.run_tick().await {
            Ok(summary) if summary.jobs_found > 0 => {
                if summary.jobs_failed > 0 || summary.audit_failures > 0 {
                    warn!(
                        jobs_failed = summary.jobs_failed,
                        audit_failures = summary.audit_failures,
                        "Tick finished with failures"
                    );
                }
            }
            Ok(_) => {}
            Err(e) => error!("Scheduler tick failed: {:?}", e),
        }
    }

    info!("Scheduler loop stopped");
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
