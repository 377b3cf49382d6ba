//! `titan-client`: thin CLI wrapper around the Manager's RPC surface
//! (SPEC_FULL.md §4.7). Out of the control plane's correctness surface, but
//! fully implemented — submit a job, list all jobs, or poll one by id.

use clap::Parser;

use titan_common::api::manager::{JobRequest, JobStatusResponse, JobResponse, ListJobsResponse};

#[derive(Parser, Debug)]
#[command(name = "titan-client")]
struct Args {
    /// Submit a new job running this command line.
    #[arg(long, conflicts_with_all = ["list", "status"])]
    command: Option<String>,

    /// List all jobs known to the Manager.
    #[arg(long, conflicts_with_all = ["command", "status"])]
    list: bool,

    /// Poll the status of a single job by id.
    #[arg(long, conflicts_with_all = ["command", "list"])]
    status: Option<String>,

    /// Manager address to talk to.
    #[arg(long, default_value = "localhost:8080")]
    manager: String,
}

impl Args {
    /// clap's `conflicts_with_all` enforces "at most one"; this enforces the
    /// other half of "exactly one of `--command`/`--list`/`--status`".
    fn validate(&self) {
        if self.command.is_none() && !self.list && self.status.is_none() {
            eprintln!("error: exactly one of --command, --list, --status is required");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();
    args.validate();
    let http = reqwest::Client::new();
    let base = format!("http://{}", args.manager.trim_end_matches('/'));

    let result = if let Some(command) = &args.command {
        submit(&http, &base, command).await
    } else if args.list {
        list(&http, &base).await
    } else if let Some(job_id) = &args.status {
        status(&http, &base, job_id).await
    } else {
        unreachable!("Args::validate guarantees exactly one action is set")
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn submit(http: &reqwest::Client, base: &str, command: &str) -> Result<(), String> {
    let response = http
        .post(format!("{base}/rpc/submit_job"))
        .json(&JobRequest {
            command: command.to_string(),
            env: Default::default(),
        })
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("manager rejected submission: {}", response.status()));
    }

    let body: JobResponse = response.json().await.map_err(|e| e.to_string())?;
    println!("job {} submitted (status: {:?})", body.job_id, body.status);
    Ok(())
}

async fn list(http: &reqwest::Client, base: &str) -> Result<(), String> {
    let response = http
        .get(format!("{base}/rpc/jobs"))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("manager error: {}", response.status()));
    }

    let body: ListJobsResponse = response.json().await.map_err(|e| e.to_string())?;
    if body.jobs.is_empty() {
        println!("no jobs");
        return Ok(());
    }

    for job in body.jobs {
        print_job(&job);
    }
    Ok(())
}

async fn status(http: &reqwest::Client, base: &str, job_id: &str) -> Result<(), String> {
    let response = http
        .get(format!("{base}/rpc/job_status/{job_id}"))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(format!("job {job_id} not found"));
    }
    if !response.status().is_success() {
        return Err(format!("manager error: {}", response.status()));
    }

    let body: JobStatusResponse = response.json().await.map_err(|e| e.to_string())?;
    print_job(&body);
    Ok(())
}

fn print_job(job: &JobStatusResponse) {
    println!(
        "job {}  status={:?}  worker={}  exit_code={}  output={:?}",
        job.job_id,
        job.status,
        job.worker_id
            .as_ref()
            .map(|w| w.to_string())
            .unwrap_or_else(|| "-".to_string()),
        job.exit_code,
        job.output,
    );
}
