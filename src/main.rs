//! Tablewatch - Legacy Table Change Monitor
//!
//! Watches file-based legacy table stores for row changes and notifies
//! webhook consumers. Each configured monitor polls its primary table on a
//! fixed interval, classifies the delta against the last snapshot as
//! new / modified / deleted, enriches changed rows from related tables, and
//! POSTs the result to its configured webhook.
//!
//! A small read-only HTTP surface exposes per-monitor status for
//! diagnostics; it never mutates monitor state.

mod config;
mod detect;
mod enrich;
mod error;
mod fingerprint;
mod monitor;
mod notify;
mod record;
mod routes;
mod source;
mod state;

use crate::config::Settings;
use crate::monitor::Monitor;
use crate::routes::create_router;
use crate::source::CsvDirectorySource;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting Tablewatch - Legacy Table Change Monitor...");

    // Load configuration; an invalid config refuses to start anything.
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!("❌ FATAL: {}", e);
            anyhow::bail!("Cannot start without a valid configuration");
        }
    };
    info!("📋 Configuration loaded: {} monitor(s)", settings.monitors.len());

    // Shutdown signal fanned out to every monitor task.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut statuses = Vec::new();
    let mut tasks = Vec::new();
    for monitor_config in settings.monitors.clone() {
        let name = monitor_config.name.clone();
        let source = Arc::new(CsvDirectorySource::new(monitor_config.data_dir.clone()));
        let monitor = Monitor::new(monitor_config, source)
            .map_err(|e| anyhow::anyhow!("Monitor '{}': {}", name, e))?;
        statuses.push(monitor.status());
        tasks.push(tokio::spawn(monitor.run(shutdown_rx.clone())));
    }

    let app_state = Arc::new(AppState::new(statuses));
    let app = create_router(app_state);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    info!("🌐 Status surface listening on http://{}", addr);
    info!("");
    info!("📚 Endpoints:");
    info!("   GET  /health               - Liveness check");
    info!("   GET  /api/monitors         - Status of all monitors");
    info!("   GET  /api/monitors/{{name}}  - Status of one monitor");
    info!("");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The status server has exited; stop the monitors and wait for each to
    // finish its in-flight cycle.
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }

    info!("👋 Shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tablewatch=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
