//! Periodically asserts liveness to the Manager (SPEC_FULL.md §4.4). Fixed
//! 10s interval, no backoff or escalation on failure — a missed heartbeat is
//! simply retried at the next tick.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use titan_common::config::HEARTBEAT_INTERVAL_SECONDS;
use titan_common::ids::WorkerId;

use crate::manager_client::ManagerClient;

pub struct Heartbeater {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl Heartbeater {
    pub fn start(worker_id: WorkerId, manager_client: Arc<ManagerClient>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(heartbeat_loop(worker_id, manager_client, shutdown_rx));

        tracing::info!("heartbeater started");
        Self {
            handle,
            shutdown_tx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

async fn heartbeat_loop(
    worker_id: WorkerId,
    manager_client: Arc<ManagerClient>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(HEARTBEAT_INTERVAL_SECONDS));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("heartbeater shutting down");
                    return;
                }
            }
        }

        // The source reports mock fixed usage values; a faithful
        // implementation may sample real usage instead. Sampling real
        // process/host metrics is out of scope here — see DESIGN.md.
        let (used_cpu, used_mem) = sample_usage();

        if let Err(e) = manager_client
            .heartbeat(&worker_id, used_cpu, used_mem)
            .await
        {
            tracing::warn!(error = %e, "heartbeat failed, will retry next tick");
        }
    }
}

fn sample_usage() -> (i32, i64) {
    (0, 0)
}
