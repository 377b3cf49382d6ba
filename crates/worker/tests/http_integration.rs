//! Integration tests against the Worker's HTTP surface, in-process via
//! `tower::ServiceExt::oneshot`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;

use titan_common::config::RetryConfig;
use titan_worker::executor::Executor;
use titan_worker::manager_client::ManagerClient;
use titan_worker::rpc::{router, AppState};
use titan_worker::shell::DefaultShell;

fn make_state() -> Arc<AppState> {
    let manager_client = Arc::new(ManagerClient::new(
        "127.0.0.1:1".to_string(),
        RetryConfig {
            max_attempts: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
            backoff_multiplier: 1.0,
            jitter: false,
        },
    ));
    let executor = Arc::new(Executor::new(manager_client, Arc::new(DefaultShell)));
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
    Arc::new(AppState {
        executor,
        metrics_handle,
    })
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn start_task_request(task_id: uuid::Uuid, command: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/rpc/start_task")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "task_id": task_id.to_string(),
                "job_id": task_id.to_string(),
                "command": command,
                "env": HashMap::<String, String>::new(),
            })
            .to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn start_task_accepts_a_fresh_task_id() {
    let app = router(make_state());
    let task_id = uuid::Uuid::new_v4();

    let response = app
        .oneshot(start_task_request(task_id, "sleep 1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["accepted"], true);
}

#[tokio::test]
async fn duplicate_task_id_is_rejected_with_accepted_false() {
    let app = router(make_state());
    let task_id = uuid::Uuid::new_v4();

    let first = app
        .clone()
        .oneshot(start_task_request(task_id, "sleep 1"))
        .await
        .unwrap();
    assert_eq!(json_body(first).await["accepted"], true);

    let second = app
        .clone()
        .oneshot(start_task_request(task_id, "echo nope"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let body = json_body(second).await;
    assert_eq!(body["accepted"], false);

    // Clean up the still-running first task.
    let stop = Request::builder()
        .method("POST")
        .uri("/rpc/stop_task")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "task_id": task_id.to_string() }).to_string()))
        .unwrap();
    let response = app.oneshot(stop).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn stop_task_on_unknown_id_is_not_found() {
    let app = router(make_state());
    let req = Request::builder()
        .method("POST")
        .uri("/rpc/stop_task")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "task_id": uuid::Uuid::new_v4().to_string() }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_metrics_routes_respond() {
    let app = router(make_state());

    let health = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        app.clone().oneshot(health).await.unwrap().status(),
        StatusCode::OK
    );

    let metrics = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        app.oneshot(metrics).await.unwrap().status(),
        StatusCode::OK
    );
}
