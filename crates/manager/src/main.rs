use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use titan_common::config::ClusterConfig;

use titan_manager::rpc::{router, AppState, WorkerClients};
use titan_manager::scheduler::Scheduler;
use titan_manager::store::Store;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("titan-manager starting");

    // Cluster tuning is the only configurable surface besides env vars —
    // the Manager CLI itself stays flag-free per the distilled spec.
    let config_path = std::env::var("TITAN_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("titan.toml"));

    let config = match ClusterConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load cluster config — refusing to start");
            std::process::exit(1);
        }
    };

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder");

    let store = Arc::new(Store::new(Duration::from_secs(
        config.heartbeat_timeout_seconds,
    )));
    let clients = Arc::new(WorkerClients::new());

    let scheduler = Scheduler::start(
        Arc::clone(&store),
        Arc::clone(&clients),
        Duration::from_secs(config.scheduler_tick_seconds),
    );

    let state = Arc::new(AppState {
        store,
        clients,
        metrics_handle,
    });

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(port, error = %e, "failed to bind TCP listener");
            std::process::exit(1);
        }
    };

    tracing::info!(port, "titan-manager listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server error");

    scheduler.shutdown();
    scheduler.join().await;
    tracing::info!("titan-manager shut down cleanly");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("shutdown signal received");
}
