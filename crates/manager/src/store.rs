use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use titan_common::ids::{JobId, WorkerId};
use titan_common::model::{Job, JobStatus, Worker, WorkerStatus};
use titan_common::{Result, TitanError};

/// In-memory registry of jobs and workers — the cluster's sole source of
/// truth (§4.1 of SPEC_FULL.md). Readers and writers serialize through a
/// single `tokio::sync::RwLock` per map; every `get_*` method returns an
/// owned snapshot, never a live reference, so callers can only mutate state
/// by routing back through `Store`'s own methods.
pub struct Store {
    jobs: RwLock<HashMap<JobId, Job>>,
    workers: RwLock<HashMap<WorkerId, Worker>>,
    heartbeat_timeout: Duration,
}

impl Store {
    pub fn new(heartbeat_timeout: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            workers: RwLock::new(HashMap::new()),
            heartbeat_timeout,
        }
    }

    /// Insert a freshly-submitted job (always Pending).
    pub async fn add_job(&self, job: Job) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id, job);
    }

    pub async fn get_job(&self, id: JobId) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    pub async fn get_all_jobs(&self) -> Vec<Job> {
        self.jobs.read().await.values().cloned().collect()
    }

    /// Jobs awaiting scheduling (status == Pending).
    pub async fn get_pending_jobs(&self) -> Vec<Job> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .cloned()
            .collect()
    }

    /// Scheduler's guarded Pending -> Scheduled transition (§4.2). Rejects
    /// anything but a Pending job, closing the race where a job could be
    /// scheduled twice if two ticks raced on the same job.
    pub async fn schedule_job(&self, id: JobId, worker_id: WorkerId) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| TitanError::NotFound(format!("job {id}")))?;

        if !job.status.can_transition_to(JobStatus::Scheduled) || job.status != JobStatus::Pending
        {
            return Err(TitanError::NonMonotoneTransition {
                job_id: id.to_string(),
                from: format!("{:?}", job.status),
                to: "SCHEDULED".to_string(),
            });
        }

        job.status = JobStatus::Scheduled;
        job.worker_id = Some(worker_id);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    /// Guarded status transition used by `ReportTaskStatus` (§4.1's
    /// `update_job_status`, the adopted redesign flag closing the "status
    /// transitions lack guard" gap). Rejects non-monotone updates (J2)
    /// instead of assigning the field unconditionally.
    pub async fn report_task_status(
        &self,
        task_id: JobId,
        status: JobStatus,
        output: String,
        exit_code: i32,
    ) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&task_id)
            .ok_or_else(|| TitanError::NotFound(format!("job {task_id}")))?;

        if !job.status.can_transition_to(status) {
            return Err(TitanError::NonMonotoneTransition {
                job_id: task_id.to_string(),
                from: format!("{:?}", job.status),
                to: format!("{:?}", status),
            });
        }

        job.status = status;
        job.output = output;
        job.exit_code = exit_code;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    /// Create or replace a worker record (W1: re-registration with the same
    /// id replaces the previous record).
    pub async fn register_worker(&self, worker: Worker) {
        let mut workers = self.workers.write().await;
        workers.insert(worker.id.clone(), worker);
    }

    pub async fn get_worker(&self, id: &WorkerId) -> Option<Worker> {
        self.workers.read().await.get(id).cloned()
    }

    pub async fn get_all_workers(&self) -> Vec<Worker> {
        self.workers.read().await.values().cloned().collect()
    }

    /// Advance `last_heartbeat` and refresh reported usage for a known
    /// worker. Idempotent: replaying the same heartbeat just advances the
    /// timestamp again. A heartbeat for an unknown worker id is a silent
    /// no-op, not an error (§4.1, §4.5 — unlike GetJobStatus, the Heartbeat
    /// RPC has no not-found outcome).
    pub async fn update_worker_heartbeat(
        &self,
        id: &WorkerId,
        used_cpu_millicores: i32,
        used_memory_mb: i64,
    ) {
        let mut workers = self.workers.write().await;
        let Some(worker) = workers.get_mut(id) else {
            return;
        };

        worker.last_heartbeat = Utc::now();
        worker.used_cpu_millicores = used_cpu_millicores;
        worker.used_memory_mb = used_memory_mb;
        worker.status = WorkerStatus::Healthy;
    }

    /// Workers whose heartbeat gap is under the timeout (W2). Health is
    /// recomputed from wall-clock time here rather than trusted from the
    /// stored `status` field, which only reflects the state as of the last
    /// write.
    pub async fn get_healthy_workers(&self) -> Vec<Worker> {
        let now = Utc::now();
        self.workers
            .read()
            .await
            .values()
            .filter(|worker| {
                let elapsed = now.signed_duration_since(worker.last_heartbeat);
                elapsed.to_std().map(|d| d < self.heartbeat_timeout).unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn make_job() -> Job {
        Job::new(JobId::new(), "echo hi".to_string(), Map::new())
    }

    fn make_worker(id: &str) -> Worker {
        Worker::new(WorkerId::new(id), "localhost:9000".to_string(), 4000, 8192)
    }

    #[tokio::test]
    async fn add_and_get_job_round_trips() {
        let store = Store::new(Duration::from_secs(30));
        let job = make_job();
        let id = job.id;
        store.add_job(job).await;

        let fetched = store.get_job(id).await.expect("job must exist");
        assert_eq!(fetched.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn get_pending_jobs_filters_by_status() {
        let store = Store::new(Duration::from_secs(30));
        let job = make_job();
        let id = job.id;
        store.add_job(job).await;

        assert_eq!(store.get_pending_jobs().await.len(), 1);

        let worker_id = WorkerId::new("w1");
        store.schedule_job(id, worker_id).await.unwrap();
        assert_eq!(store.get_pending_jobs().await.len(), 0);
    }

    #[tokio::test]
    async fn schedule_job_rejects_non_pending() {
        let store = Store::new(Duration::from_secs(30));
        let job = make_job();
        let id = job.id;
        store.add_job(job).await;

        store.schedule_job(id, WorkerId::new("w1")).await.unwrap();
        let second = store.schedule_job(id, WorkerId::new("w2")).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn report_task_status_rejects_regression_after_terminal() {
        let store = Store::new(Duration::from_secs(30));
        let job = make_job();
        let id = job.id;
        store.add_job(job).await;

        store
            .report_task_status(id, JobStatus::Running, String::new(), 0)
            .await
            .unwrap();
        store
            .report_task_status(id, JobStatus::Completed, "hi\n".to_string(), 0)
            .await
            .unwrap();

        // A late, re-delivered RUNNING arriving after COMPLETED must not regress the job.
        let late = store
            .report_task_status(id, JobStatus::Running, String::new(), 0)
            .await;
        assert!(late.is_err());

        let job = store.get_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn register_worker_is_idempotent_on_id() {
        let store = Store::new(Duration::from_secs(30));
        store.register_worker(make_worker("w1")).await;
        store.register_worker(make_worker("w1")).await;

        assert_eq!(store.get_all_workers().await.len(), 1);
    }

    #[tokio::test]
    async fn healthy_workers_exclude_stale_heartbeats() {
        let store = Store::new(Duration::from_millis(10));
        let worker = make_worker("w1");
        let id = worker.id.clone();
        store.register_worker(worker).await;

        assert_eq!(store.get_healthy_workers().await.len(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get_healthy_workers().await.len(), 0);

        // Heartbeat revives it.
        store.update_worker_heartbeat(&id, 50, 128).await;
        assert_eq!(store.get_healthy_workers().await.len(), 1);
    }

    #[tokio::test]
    async fn heartbeat_on_unknown_worker_is_a_silent_no_op() {
        let store = Store::new(Duration::from_secs(30));
        store.update_worker_heartbeat(&WorkerId::new("ghost"), 0, 0).await;
        assert!(store.get_all_workers().await.is_empty());
    }
}
