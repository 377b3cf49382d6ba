use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{JobId, WorkerId};
use crate::model::JobStatus;

/// POST /rpc/submit_job request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobRequest {
    pub command: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// POST /rpc/submit_job response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// GET /rpc/job_status/:id response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    pub output: String,
    pub exit_code: i32,
}

/// GET /rpc/jobs response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobStatusResponse>,
}

/// POST /rpc/register_worker request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub worker_id: WorkerId,
    pub address: String,
    pub total_cpu_millicores: i32,
    pub total_memory_mb: i64,
}

/// POST /rpc/register_worker response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub accepted: bool,
    pub message: String,
}

/// POST /rpc/heartbeat request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub worker_id: WorkerId,
    pub timestamp: i64,
    pub used_cpu_millicores: i32,
    pub used_memory_mb: i64,
}

/// POST /rpc/heartbeat response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub acknowledged: bool,
}

/// POST /rpc/report_task_status request. `task_id` doubles as the job id
/// (§3: task and job share an identifier 1:1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskStatusUpdate {
    pub task_id: JobId,
    pub status: JobStatus,
    pub output: String,
    pub exit_code: i32,
}

/// Generic acknowledgement reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}
