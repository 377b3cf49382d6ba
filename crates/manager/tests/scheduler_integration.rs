//! Scheduler behavior exercised against real (but fake) worker HTTP servers
//! bound to `127.0.0.1:0`, so round-robin fan-out and rejection handling run
//! over the actual RPC path without needing a real Worker binary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use titan_common::api::worker::{TaskRequest, TaskResponse};
use titan_common::model::{Job, JobStatus, Worker};
use titan_manager::rpc::WorkerClients;
use titan_manager::scheduler::Scheduler;
use titan_manager::store::Store;

/// A fake worker that accepts every task and records task ids it has seen,
/// bound to an ephemeral localhost port.
struct FakeWorker {
    address: String,
    seen: Arc<std::sync::Mutex<Vec<String>>>,
}

async fn start_fake_worker(reject_after: Option<usize>) -> FakeWorker {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let counter = Arc::new(AtomicUsize::new(0));

    #[derive(Clone)]
    struct FakeState {
        seen: Arc<std::sync::Mutex<Vec<String>>>,
        counter: Arc<AtomicUsize>,
        reject_after: Option<usize>,
    }

    async fn start_task(
        State(state): State<FakeState>,
        Json(req): Json<TaskRequest>,
    ) -> Json<TaskResponse> {
        let n = state.counter.fetch_add(1, Ordering::SeqCst);
        if state.reject_after.is_some_and(|limit| n >= limit) {
            return Json(TaskResponse {
                accepted: false,
                message: "already live".into(),
            });
        }
        state.seen.lock().unwrap().push(req.task_id.to_string());
        Json(TaskResponse {
            accepted: true,
            message: "started".into(),
        })
    }

    let state = FakeState {
        seen: Arc::clone(&seen),
        counter,
        reject_after,
    };
    let app = Router::new()
        .route("/rpc/start_task", post(start_task))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeWorker { address, seen }
}

fn make_job(command: &str) -> Job {
    Job::new(titan_common::JobId::new(), command.to_string(), HashMap::new())
}

#[tokio::test]
async fn round_robin_fan_out_across_two_workers() {
    let w1 = start_fake_worker(None).await;
    let w2 = start_fake_worker(None).await;

    let store = Arc::new(Store::new(Duration::from_secs(30)));
    store
        .register_worker(Worker::new(
            titan_common::WorkerId::new("w1"),
            w1.address.clone(),
            4000,
            8192,
        ))
        .await;
    store
        .register_worker(Worker::new(
            titan_common::WorkerId::new("w2"),
            w2.address.clone(),
            4000,
            8192,
        ))
        .await;

    for i in 0..4 {
        store.add_job(make_job(&format!("echo {i}"))).await;
    }

    let clients = Arc::new(WorkerClients::new());
    let scheduler = Scheduler::start(
        Arc::clone(&store),
        clients,
        Duration::from_millis(20),
    );

    // Give the scheduler a couple of ticks to drain the four pending jobs.
    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.shutdown();
    scheduler.join().await;

    assert_eq!(w1.seen.lock().unwrap().len(), 2);
    assert_eq!(w2.seen.lock().unwrap().len(), 2);

    let jobs = store.get_all_jobs().await;
    assert!(jobs.iter().all(|j| j.status == JobStatus::Scheduled));
}

#[tokio::test]
async fn rejected_task_leaves_job_pending_and_does_not_advance_cursor() {
    // Accepts the first task then rejects everything after, simulating the
    // duplicate-task-id rejection path (§4.6): the job must stay PENDING.
    let w1 = start_fake_worker(Some(0)).await;

    let store = Arc::new(Store::new(Duration::from_secs(30)));
    store
        .register_worker(Worker::new(
            titan_common::WorkerId::new("w1"),
            w1.address.clone(),
            4000,
            8192,
        ))
        .await;

    store.add_job(make_job("echo only")).await;

    let clients = Arc::new(WorkerClients::new());
    let scheduler = Scheduler::start(Arc::clone(&store), clients, Duration::from_millis(20));

    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.shutdown();
    scheduler.join().await;

    let jobs = store.get_all_jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Pending);
    assert!(jobs[0].worker_id.is_none());
}

#[tokio::test]
async fn no_healthy_workers_leaves_jobs_pending_across_ticks() {
    let store = Arc::new(Store::new(Duration::from_secs(30)));
    store.add_job(make_job("echo x")).await;

    let clients = Arc::new(WorkerClients::new());
    let scheduler = Scheduler::start(Arc::clone(&store), clients, Duration::from_millis(20));

    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.shutdown();
    scheduler.join().await;

    let jobs = store.get_all_jobs().await;
    assert_eq!(jobs[0].status, JobStatus::Pending);
}
