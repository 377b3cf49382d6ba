use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};

use titan_common::api::manager::{
    Ack, HeartbeatRequest, HeartbeatResponse, JobRequest, JobResponse, JobStatusResponse,
    ListJobsResponse, RegistrationResponse, TaskStatusUpdate, WorkerInfo,
};
use titan_common::api::worker::{StopTaskRequest, StopTaskResponse, TaskRequest, TaskResponse};
use titan_common::ids::JobId;
use titan_common::model::{Job, Worker};
use titan_common::{Result, TitanError};

use crate::store::Store;

/// Dispatches RPCs to Workers at the address the Store currently has on
/// file for them (§4.2). There is no separate per-worker connection cache
/// to evict on failure: `reqwest::Client` pools connections internally
/// keyed by host, and the Scheduler re-reads each worker's address from the
/// Store on every tick, so a failed call against a stale address is simply
/// not retried against that address again until the Store reports a new
/// one — see DESIGN.md.
pub struct WorkerClients {
    http: reqwest::Client,
}

impl WorkerClients {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub async fn start_task(&self, address: &str, request: &TaskRequest) -> Result<TaskResponse> {
        let url = format!("http://{}/rpc/start_task", address.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TitanError::Transport(format!("start_task to {address}: {e}")))?;

        response
            .json::<TaskResponse>()
            .await
            .map_err(|e| TitanError::Transport(format!("decoding start_task response: {e}")))
    }

    pub async fn stop_task(&self, address: &str, task_id: JobId) -> Result<StopTaskResponse> {
        let url = format!("http://{}/rpc/stop_task", address.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(&StopTaskRequest { task_id })
            .send()
            .await
            .map_err(|e| TitanError::Transport(format!("stop_task to {address}: {e}")))?;

        response
            .json::<StopTaskResponse>()
            .await
            .map_err(|e| TitanError::Transport(format!("decoding stop_task response: {e}")))
    }
}

pub struct AppState {
    pub store: Arc<Store>,
    pub clients: Arc<WorkerClients>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl IntoResponse for TitanError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            TitanError::NotFound(_) => StatusCode::NOT_FOUND,
            TitanError::DuplicateTask(_) => StatusCode::CONFLICT,
            TitanError::NonMonotoneTransition { .. } => StatusCode::CONFLICT,
            TitanError::Validation(_) => StatusCode::BAD_REQUEST,
            TitanError::Transport(_) => StatusCode::BAD_GATEWAY,
            TitanError::Config(_) | TitanError::Launch(_) | TitanError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_handler))
        .route("/metrics", axum::routing::get(metrics_handler))
        .route("/rpc/submit_job", axum::routing::post(submit_job))
        .route("/rpc/job_status/{id}", axum::routing::get(job_status))
        .route("/rpc/jobs", axum::routing::get(list_jobs))
        .route("/rpc/register_worker", axum::routing::post(register_worker))
        .route("/rpc/heartbeat", axum::routing::post(heartbeat))
        .route(
            "/rpc/report_task_status",
            axum::routing::post(report_task_status),
        )
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

fn to_status_response(job: Job) -> JobStatusResponse {
    JobStatusResponse {
        job_id: job.id,
        status: job.status,
        worker_id: job.worker_id,
        output: job.output,
        exit_code: job.exit_code,
    }
}

async fn submit_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JobRequest>,
) -> std::result::Result<Json<JobResponse>, TitanError> {
    if request.command.trim().is_empty() {
        return Err(TitanError::Validation("command must not be empty".into()));
    }

    let job = Job::new(JobId::new(), request.command, request.env);
    let id = job.id;
    let status = job.status;
    state.store.add_job(job).await;

    metrics::counter!("titan.manager.jobs_submitted").increment(1);
    tracing::info!(job_id = %id, "job submitted");

    Ok(Json(JobResponse {
        job_id: id,
        status,
    }))
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> std::result::Result<Json<JobStatusResponse>, TitanError> {
    let job = state
        .store
        .get_job(id)
        .await
        .ok_or_else(|| TitanError::NotFound(format!("job {id}")))?;
    Ok(Json(to_status_response(job)))
}

async fn list_jobs(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<ListJobsResponse>, TitanError> {
    let jobs = state
        .store
        .get_all_jobs()
        .await
        .into_iter()
        .map(to_status_response)
        .collect();
    Ok(Json(ListJobsResponse { jobs }))
}

async fn register_worker(
    State(state): State<Arc<AppState>>,
    Json(info): Json<WorkerInfo>,
) -> std::result::Result<Json<RegistrationResponse>, TitanError> {
    let worker = Worker::new(
        info.worker_id.clone(),
        info.address,
        info.total_cpu_millicores,
        info.total_memory_mb,
    );
    state.store.register_worker(worker).await;

    tracing::info!(worker_id = %info.worker_id, "worker registered");
    Ok(Json(RegistrationResponse {
        accepted: true,
        message: "registered".to_string(),
    }))
}

async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<HeartbeatRequest>,
) -> Json<HeartbeatResponse> {
    state
        .store
        .update_worker_heartbeat(
            &request.worker_id,
            request.used_cpu_millicores,
            request.used_memory_mb,
        )
        .await;

    // Acknowledged unconditionally, even for an unknown worker id — the
    // original has no not-found branch here (§4.5).
    Json(HeartbeatResponse { acknowledged: true })
}

async fn report_task_status(
    State(state): State<Arc<AppState>>,
    Json(update): Json<TaskStatusUpdate>,
) -> std::result::Result<Json<Ack>, TitanError> {
    state
        .store
        .report_task_status(update.task_id, update.status, update.output, update.exit_code)
        .await?;

    Ok(Json(Ack { ok: true }))
}
