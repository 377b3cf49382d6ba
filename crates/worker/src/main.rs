use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;

use titan_common::api::manager::WorkerInfo;
use titan_common::config::ClusterConfig;
use titan_common::ids::WorkerId;

use titan_worker::executor::Executor;
use titan_worker::heartbeat::Heartbeater;
use titan_worker::manager_client::ManagerClient;
use titan_worker::rpc::{router, AppState};
use titan_worker::shell::DefaultShell;

/// Command-line flags for `titan-worker` (SPEC_FULL.md §4.7/§6): unlike the
/// Manager, the Worker does take flags — `--id` is the one required value,
/// since worker ids are operator-chosen rather than minted.
#[derive(Parser, Debug)]
#[command(name = "titan-worker")]
struct Args {
    /// Worker id this node registers under (W1: unique; re-registration
    /// with the same id replaces the previous Manager-side record).
    #[arg(long, env = "TITAN_WORKER_ID")]
    id: String,

    /// Port this worker's RPC endpoint listens on.
    #[arg(long, env = "TITAN_WORKER_PORT", default_value_t = 8081)]
    port: u16,

    /// Manager address to register with and report to.
    #[arg(long, env = "TITAN_MANAGER_ADDR", default_value = "localhost:8080")]
    manager: String,

    /// Declared total CPU millicores (collected but not used for
    /// placement — non-goal "no resource-aware scheduling").
    #[arg(long, default_value_t = 4000)]
    total_cpu_millicores: i32,

    /// Declared total memory in MB.
    #[arg(long, default_value_t = 8192)]
    total_memory_mb: i64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let worker_id = WorkerId::new(args.id.clone());

    tracing::info!(worker_id = %worker_id, port = args.port, manager = %args.manager, "titan-worker starting");

    // The same `titan.toml` the Manager reads for scheduler/heartbeat
    // tuning also carries the Worker's status-report retry policy, so a
    // Worker reads it too when present (§4.3's adopted redesign flag).
    let config_path = std::env::var("TITAN_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("titan.toml"));
    let config = match ClusterConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load cluster config — refusing to start");
            std::process::exit(1);
        }
    };

    let manager_client = Arc::new(ManagerClient::new(
        args.manager.clone(),
        config.status_report_retry.clone(),
    ));

    let own_address = format!("localhost:{}", args.port);
    let registration = WorkerInfo {
        worker_id: worker_id.clone(),
        address: own_address,
        total_cpu_millicores: args.total_cpu_millicores,
        total_memory_mb: args.total_memory_mb,
    };

    match manager_client.register(&registration).await {
        Ok(response) if response.accepted => {
            tracing::info!(message = %response.message, "registered with manager");
        }
        Ok(response) => {
            tracing::error!(message = %response.message, "manager rejected registration");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, manager = %args.manager, "manager unreachable at startup");
            std::process::exit(1);
        }
    }

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder");

    let executor = Arc::new(Executor::new(
        Arc::clone(&manager_client),
        Arc::new(DefaultShell),
    ));

    let heartbeater = Heartbeater::start(worker_id, Arc::clone(&manager_client));

    let state = Arc::new(AppState {
        executor,
        metrics_handle,
    });
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(format!("localhost:{}", args.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(port = args.port, error = %e, "failed to bind TCP listener");
            std::process::exit(1);
        }
    };

    tracing::info!(port = args.port, "titan-worker listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server error");

    heartbeater.shutdown();
    heartbeater.join().await;
    tracing::info!("titan-worker shut down cleanly");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("shutdown signal received");
}
