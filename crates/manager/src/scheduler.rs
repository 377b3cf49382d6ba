use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use titan_common::api::worker::TaskRequest;
use titan_common::ids::WorkerId;
use titan_common::model::Job;

use crate::rpc::WorkerClients;
use crate::store::Store;

/// Periodic round-robin assignment of Pending jobs onto healthy Workers
/// (§4.2). One background task, ticking on a fixed interval rather than
/// reacting to individual submissions — a submission just waits for the
/// next tick, same as the distilled spec describes.
pub struct Scheduler {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn start(store: Arc<Store>, clients: Arc<WorkerClients>, tick: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler_loop(store, clients, tick, shutdown_rx));

        tracing::info!(tick_secs = tick.as_secs(), "scheduler started");
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

async fn scheduler_loop(
    store: Arc<Store>,
    clients: Arc<WorkerClients>,
    tick: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(tick);
    // The first tick fires immediately; skip it so startup doesn't race
    // the Manager's own HTTP listener coming up.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("scheduler shutting down");
                    return;
                }
            }
        }

        let pending = store.get_pending_jobs().await;
        if pending.is_empty() {
            continue;
        }

        let healthy = store.get_healthy_workers().await;
        if healthy.is_empty() {
            tracing::debug!(pending = pending.len(), "no healthy workers, deferring");
            continue;
        }

        // Round-robin cursor, reset at the start of every tick and advanced
        // only by successful assignments within this tick (§4.2: "i counts
        // successful assignments in this tick ... starting from index 0").
        let mut cursor: usize = 0;

        for job in pending {
            let worker = &healthy[cursor % healthy.len()];

            match try_assign(&store, &clients, &job, &worker.id, &worker.address).await {
                Ok(true) => {
                    // Only a confirmed acceptance advances the cursor (§4.2:
                    // "do not advance i" on rejection or transport error).
                    cursor = cursor.wrapping_add(1);
                    tracing::info!(job_id = %job.id, worker_id = %worker.id, "job assigned");
                }
                Ok(false) => {
                    tracing::debug!(job_id = %job.id, worker_id = %worker.id, "worker rejected task, leaving pending");
                }
                Err(e) => {
                    tracing::warn!(job_id = %job.id, worker_id = %worker.id, error = %e, "assignment failed");
                }
            }
        }
    }
}

/// Attempt to place one job on one worker. Returns `Ok(true)` only once the
/// worker has confirmed acceptance over RPC — the job is not marked
/// SCHEDULED in the Store until then (§4.2: "no prior reservation", the job
/// stays PENDING until the worker confirms). `Ok(false)` is a rejection
/// (duplicate task id on the worker); `Err` is a transport failure.
async fn try_assign(
    store: &Store,
    clients: &WorkerClients,
    job: &Job,
    worker_id: &WorkerId,
    worker_address: &str,
) -> titan_common::Result<bool> {
    let request = TaskRequest {
        task_id: job.id,
        job_id: job.id,
        command: job.command.clone(),
        env: job.env.clone(),
    };

    let response = clients.start_task(worker_address, &request).await?;
    if !response.accepted {
        return Ok(false);
    }

    store.schedule_job(job.id, worker_id.clone()).await?;
    Ok(true)
}
