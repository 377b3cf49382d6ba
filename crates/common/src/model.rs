use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{JobId, WorkerId};

/// Lifecycle state of a job (§3, invariant J2: transitions are monotone through
/// the ordered set Pending -> Scheduled -> Running -> (Completed | Failed);
/// once terminal, no further transitions are permitted).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Position in the monotone ordering. Completed and Failed share the
    /// terminal rank — either is a valid successor to Running, never to
    /// each other.
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Scheduled => 1,
            Self::Running => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// J2: whether moving from `self` to `next` is a legal transition.
    /// A terminal status accepts no further transitions, including a repeat
    /// of itself. A non-terminal status may repeat (idempotent duplicate
    /// reports, e.g. a re-delivered RUNNING) or advance, but never regress.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

/// A unit of work submitted by a client (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub command: String,
    pub env: HashMap<String, String>,
    pub status: JobStatus,
    /// Non-empty iff status >= Scheduled (J4).
    pub worker_id: Option<WorkerId>,
    pub output: String,
    pub exit_code: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, command: String, env: HashMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            command,
            env,
            status: JobStatus::Pending,
            worker_id: None,
            output: String::new(),
            exit_code: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Health state of a worker (§3, invariant W2: healthy iff the heartbeat gap is
/// under the timeout). This field records the status as of the last write;
/// `Store::get_healthy_workers` recomputes health from `last_heartbeat` at read
/// time rather than trusting this field, since health is a function of wall
/// clock time, not of the last mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Healthy,
    Unhealthy,
}

/// A registered compute node (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub address: String,
    pub total_cpu_millicores: i32,
    pub total_memory_mb: i64,
    pub used_cpu_millicores: i32,
    pub used_memory_mb: i64,
    pub status: WorkerStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

impl Worker {
    pub fn new(id: WorkerId, address: String, total_cpu_millicores: i32, total_memory_mb: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            address,
            total_cpu_millicores,
            total_memory_mb,
            used_cpu_millicores: 0,
            used_memory_mb: 0,
            status: WorkerStatus::Healthy,
            last_heartbeat: now,
            registered_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotone_transitions_allowed() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Scheduled));
        assert!(JobStatus::Scheduled.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn duplicate_report_is_a_no_op_not_a_rejection() {
        assert!(JobStatus::Running.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn regression_rejected() {
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Scheduled.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn terminal_status_rejects_any_further_transition() {
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn skipping_scheduled_straight_to_running_is_allowed() {
        // The monotone check only orders ranks; the Scheduler is what actually
        // enforces that Scheduled happens before Running in practice.
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
    }
}
