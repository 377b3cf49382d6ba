use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::JobId;

/// POST /rpc/start_task request, sent by the Manager's Scheduler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: JobId,
    pub job_id: JobId,
    pub command: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// POST /rpc/start_task response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    pub accepted: bool,
    pub message: String,
}

/// POST /rpc/stop_task request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StopTaskRequest {
    pub task_id: JobId,
}

/// POST /rpc/stop_task response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StopTaskResponse {
    pub stopped: bool,
}
