//! Supervises child processes for assigned tasks (SPEC_FULL.md §4.3). One
//! task map keyed by task id, guarded by a mutex that is never held across a
//! process wait; a supervision activity per in-flight task reports RUNNING,
//! waits for exit, then reports the terminal status and removes itself from
//! the map.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::sync::{oneshot, Mutex};

use titan_common::ids::JobId;
use titan_common::model::JobStatus;
use titan_common::{Result, TitanError};

use crate::manager_client::ManagerClient;
use crate::shell::ShellInvocationBuilder;

/// Cap on captured stdout/stderr per stream (§4.3: "bounded size ... cap at
/// e.g. 1 MiB per stream and mark truncation"). The source is unbounded.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

struct TaskHandle {
    // `None` once a stop has been signalled; the entry itself stays in the
    // map until `supervise` reaps the child and removes it (§3: a task is
    // "destroyed when the child process is reaped and its final status is
    // reported", not when a stop is merely requested).
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
}

/// Per-worker child-process supervisor. `Arc`-wrapped so the supervision
/// task spawned by `start_task` can hold a handle back to it.
pub struct Executor {
    manager_client: Arc<ManagerClient>,
    shell: Arc<dyn ShellInvocationBuilder>,
    tasks: Mutex<HashMap<JobId, TaskHandle>>,
}

impl Executor {
    pub fn new(manager_client: Arc<ManagerClient>, shell: Arc<dyn ShellInvocationBuilder>) -> Self {
        Self {
            manager_client,
            shell,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn a child process for `task_id`/`job_id`. Rejects a task id that
    /// is already live (§4.6: the Scheduler interprets this as a back-off
    /// signal). Launch failures are not recorded in the task map at all.
    pub async fn start_task(
        self: &Arc<Self>,
        task_id: JobId,
        job_id: JobId,
        command: String,
        env: HashMap<String, String>,
    ) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&task_id) {
            return Err(TitanError::DuplicateTask(task_id.to_string()));
        }

        let mut cmd = self.shell.build(&command);
        cmd.envs(&env);
        cmd.env("TITAN_JOB_ID", job_id.to_string());
        cmd.env("TITAN_TASK_ID", task_id.to_string());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .map_err(|e| TitanError::Launch(format!("spawning {task_id}: {e}")))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        tasks.insert(
            task_id,
            TaskHandle {
                stop_tx: Mutex::new(Some(stop_tx)),
            },
        );
        drop(tasks);

        let executor = Arc::clone(self);
        tokio::spawn(async move {
            executor.supervise(task_id, child, stop_rx).await;
        });

        Ok(())
    }

    /// Signal the process to terminate. The supervision activity observes
    /// the kill, computes a nonzero exit, and transitions to FAILED.
    ///
    /// The map entry is left in place — it is only removed once `supervise`
    /// has actually reaped the child (see `TaskHandle::stop_tx`), so a
    /// `StartTask` for the same id racing a not-yet-reaped kill is still
    /// rejected as "already live" rather than silently accepted.
    pub async fn stop_task(&self, task_id: JobId) -> Result<()> {
        let tasks = self.tasks.lock().await;
        let handle = tasks
            .get(&task_id)
            .ok_or_else(|| TitanError::NotFound(format!("task {task_id}")))?;

        if let Some(stop_tx) = handle.stop_tx.lock().await.take() {
            let _ = stop_tx.send(());
        }
        Ok(())
    }

    #[cfg(test)]
    async fn is_live(&self, task_id: JobId) -> bool {
        self.tasks.lock().await.contains_key(&task_id)
    }

    async fn supervise(
        self: Arc<Self>,
        task_id: JobId,
        mut child: Child,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        if let Err(e) = self
            .manager_client
            .report_status(task_id, JobStatus::Running, String::new(), 0)
            .await
        {
            tracing::warn!(task_id = %task_id, error = %e, "failed to report RUNNING");
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_task = tokio::spawn(capture(stdout, MAX_OUTPUT_BYTES));
        let stderr_task = tokio::spawn(capture(stderr, MAX_OUTPUT_BYTES));

        let exit_code = tokio::select! {
            status = child.wait() => exit_code_of(status),
            _ = &mut stop_rx => {
                let _ = child.start_kill();
                exit_code_of(child.wait().await)
            }
        };

        let (stdout_buf, stdout_truncated) = stdout_task.await.unwrap_or_default();
        let (stderr_buf, stderr_truncated) = stderr_task.await.unwrap_or_default();

        let mut output = stdout_buf;
        output.push_str(&stderr_buf);
        if stdout_truncated || stderr_truncated {
            output.push_str("\n...[output truncated]");
        }

        let status = if exit_code == 0 {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };

        if let Err(e) = self
            .manager_client
            .report_status(task_id, status, output, exit_code)
            .await
        {
            tracing::warn!(task_id = %task_id, status = ?status, error = %e, "failed to report terminal status");
        }

        self.tasks.lock().await.remove(&task_id);
    }
}

/// Determine the exit code: the child's status if available, 1 on any
/// process-level error (including signal death, where `status.code()` is
/// `None` on POSIX).
fn exit_code_of(result: std::io::Result<std::process::ExitStatus>) -> i32 {
    match result {
        Ok(status) => status.code().unwrap_or(1),
        Err(_) => 1,
    }
}

/// Drain a pipe fully (so a chatty child never blocks on a full pipe buffer)
/// while only retaining the first `cap` bytes.
async fn capture(
    pipe: Option<impl tokio::io::AsyncRead + Unpin>,
    cap: usize,
) -> (String, bool) {
    let Some(mut pipe) = pipe else {
        return (String::new(), false);
    };

    let mut buf = Vec::with_capacity(cap.min(64 * 1024));
    let mut truncated = false;
    let mut scratch = [0u8; 8192];

    loop {
        let n = match pipe.read(&mut scratch).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };

        if buf.len() < cap {
            let remaining = cap - buf.len();
            let take = remaining.min(n);
            buf.extend_from_slice(&scratch[..take]);
            if take < n {
                truncated = true;
            }
        } else {
            truncated = true;
        }
    }

    (String::from_utf8_lossy(&buf).into_owned(), truncated)
}
