//! The Worker's HTTP surface (SPEC_FULL.md §4.6): StartTask / StopTask,
//! delegating directly to the Executor.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};

use titan_common::api::worker::{StopTaskRequest, StopTaskResponse, TaskRequest, TaskResponse};
use titan_common::TitanError;

use crate::executor::Executor;

pub struct AppState {
    pub executor: Arc<Executor>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl IntoResponse for TitanError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            TitanError::NotFound(_) => StatusCode::NOT_FOUND,
            TitanError::DuplicateTask(_) => StatusCode::CONFLICT,
            TitanError::Validation(_) => StatusCode::BAD_REQUEST,
            TitanError::Transport(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_handler))
        .route("/metrics", axum::routing::get(metrics_handler))
        .route("/rpc/start_task", axum::routing::post(start_task))
        .route("/rpc/stop_task", axum::routing::post(stop_task))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

/// Rejection (duplicate task already live) is surfaced as `accepted=false`
/// rather than an HTTP error — the Scheduler reads that as a back-off
/// signal (§4.6), not a transport failure.
async fn start_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TaskRequest>,
) -> Json<TaskResponse> {
    match state
        .executor
        .start_task(request.task_id, request.job_id, request.command, request.env)
        .await
    {
        Ok(()) => {
            metrics::counter!("titan.worker.tasks_started").increment(1);
            Json(TaskResponse {
                accepted: true,
                message: "started".to_string(),
            })
        }
        Err(TitanError::DuplicateTask(_)) => Json(TaskResponse {
            accepted: false,
            message: "task already live".to_string(),
        }),
        Err(e) => {
            tracing::warn!(task_id = %request.task_id, error = %e, "start_task failed");
            Json(TaskResponse {
                accepted: false,
                message: e.to_string(),
            })
        }
    }
}

async fn stop_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StopTaskRequest>,
) -> std::result::Result<Json<StopTaskResponse>, TitanError> {
    state.executor.stop_task(request.task_id).await?;
    Ok(Json(StopTaskResponse { stopped: true }))
}
