//! The Worker's outbound calls to the Manager: registration, heartbeats, and
//! task-status reports. Status reports go through a bounded retry (§4.3's
//! adopted redesign flag, "fire-and-forget status reports") instead of the
//! source's single-shot fire-and-forget.

use titan_common::api::manager::{
    Ack, HeartbeatRequest, HeartbeatResponse, RegistrationResponse, TaskStatusUpdate, WorkerInfo,
};
use titan_common::config::RetryConfig;
use titan_common::ids::{JobId, WorkerId};
use titan_common::model::JobStatus;
use titan_common::retry::retry_async;
use titan_common::{Result, TitanError};

pub struct ManagerClient {
    http: reqwest::Client,
    manager_address: String,
    status_report_retry: RetryConfig,
}

impl ManagerClient {
    pub fn new(manager_address: String, status_report_retry: RetryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            manager_address,
            status_report_retry,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "http://{}/{}",
            self.manager_address.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn register(&self, info: &WorkerInfo) -> Result<RegistrationResponse> {
        let response = self
            .http
            .post(self.url("rpc/register_worker"))
            .json(info)
            .send()
            .await
            .map_err(|e| TitanError::Transport(format!("register_worker: {e}")))?;

        response
            .json::<RegistrationResponse>()
            .await
            .map_err(|e| TitanError::Transport(format!("decoding register_worker response: {e}")))
    }

    pub async fn heartbeat(
        &self,
        worker_id: &WorkerId,
        used_cpu_millicores: i32,
        used_memory_mb: i64,
    ) -> Result<HeartbeatResponse> {
        let request = HeartbeatRequest {
            worker_id: worker_id.clone(),
            timestamp: chrono::Utc::now().timestamp(),
            used_cpu_millicores,
            used_memory_mb,
        };

        let response = self
            .http
            .post(self.url("rpc/heartbeat"))
            .json(&request)
            .send()
            .await
            .map_err(|e| TitanError::Transport(format!("heartbeat: {e}")))?;

        response
            .json::<HeartbeatResponse>()
            .await
            .map_err(|e| TitanError::Transport(format!("decoding heartbeat response: {e}")))
    }

    /// Report a status transition, retrying per `status_report_retry` before
    /// giving up. A retried report that arrives late is still subject to
    /// `Store::report_task_status`'s monotone guard on the Manager side, so
    /// retrying here never regresses a job that has already gone terminal.
    pub async fn report_status(
        &self,
        task_id: JobId,
        status: JobStatus,
        output: String,
        exit_code: i32,
    ) -> Result<()> {
        let update = TaskStatusUpdate {
            task_id,
            status,
            output,
            exit_code,
        };

        let result = retry_async(&self.status_report_retry, || {
            let update = update.clone();
            async {
                let response = self
                    .http
                    .post(self.url("rpc/report_task_status"))
                    .json(&update)
                    .send()
                    .await
                    .map_err(|e| TitanError::Transport(format!("report_task_status: {e}")))?;

                if !response.status().is_success() {
                    return Err(TitanError::Transport(format!(
                        "report_task_status rejected with status {}",
                        response.status()
                    )));
                }

                response
                    .json::<Ack>()
                    .await
                    .map_err(|e| TitanError::Transport(format!("decoding ack: {e}")))
            }
        })
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(task_id = %task_id, status = ?status, error = %e, "failed to report task status after retries, dropping");
                Err(e)
            }
        }
    }
}
