//! Tiles a Mandelbrot render into a 4x4 grid of jobs submitted to a running
//! Manager, polling each to completion. Ported from the original source's
//! `cmd/orchestrator`; this is the sample user workload the distilled spec
//! excludes from the control plane's core, kept here as a runnable demo the
//! Manager/Worker/Store/Scheduler/Executor do not depend on.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;

use titan_common::api::manager::{JobRequest, JobResponse, JobStatusResponse};
use titan_common::model::JobStatus;

#[derive(Parser, Debug)]
#[command(name = "orchestrator")]
struct Args {
    #[arg(long, default_value = "localhost:8080")]
    manager: String,

    #[arg(long, default_value = "fractals")]
    output_dir: String,

    #[arg(long, default_value_t = 4096)]
    full_width: u32,
    #[arg(long, default_value_t = 4096)]
    full_height: u32,
    #[arg(long, default_value_t = 1000)]
    iterations: u32,

    #[arg(long, allow_hyphen_values = true, default_value_t = -0.748)]
    min_x: f64,
    #[arg(long, allow_hyphen_values = true, default_value_t = 0.1)]
    min_y: f64,
    #[arg(long, allow_hyphen_values = true, default_value_t = -0.744)]
    max_x: f64,
    #[arg(long, allow_hyphen_values = true, default_value_t = 0.104)]
    max_y: f64,

    #[arg(long, default_value_t = 4)]
    rows: u32,
    #[arg(long, default_value_t = 4)]
    cols: u32,

    /// Path to the renderer binary each tile's job will invoke. Defaults to
    /// a sibling of this binary in the same target directory.
    #[arg(long)]
    renderer_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let renderer_path = args.renderer_path.clone().unwrap_or_else(default_renderer_path);
    std::fs::create_dir_all(&args.output_dir).expect("failed to create output directory");

    println!("=== Starting Distributed Fractal Rendering ===");
    println!("Resolution: {}x{}", args.full_width, args.full_height);
    println!(
        "Tiles: {}x{} ({} jobs)",
        args.rows,
        args.cols,
        args.rows * args.cols
    );

    let start = Instant::now();
    let http = reqwest::Client::new();
    let base = format!("http://{}", args.manager.trim_end_matches('/'));

    let tile_width = args.full_width / args.cols;
    let tile_height = args.full_height / args.rows;
    let dx = (args.max_x - args.min_x) / args.cols as f64;
    let dy = (args.max_y - args.min_y) / args.rows as f64;

    let mut tiles = Vec::new();
    for r in 0..args.rows {
        for c in 0..args.cols {
            let tile_min_x = args.min_x + c as f64 * dx;
            let tile_max_x = tile_min_x + dx;
            let tile_min_y = args.min_y + r as f64 * dy;
            let tile_max_y = tile_min_y + dy;
            let out_file = format!("{}/tile_{r}_{c}.png", args.output_dir);

            let command = format!(
                "\"{}\" --minx {tile_min_x} --miny {tile_min_y} --maxx {tile_max_x} --maxy {tile_max_y} --w {tile_width} --h {tile_height} --iter {} --out \"{out_file}\"",
                renderer_path.display(),
                args.iterations,
            );

            tiles.push((r, c, command));
        }
    }

    let handles: Vec<_> = tiles
        .into_iter()
        .map(|(r, c, command)| {
            let http = http.clone();
            let base = base.clone();
            tokio::spawn(async move { run_tile(&http, &base, r, c, command).await })
        })
        .collect();

    for handle in handles {
        let _ = handle.await;
    }

    println!("All jobs complete in {:?}", start.elapsed());
    println!("Output available in ./{}/", args.output_dir);
}

async fn run_tile(http: &reqwest::Client, base: &str, r: u32, c: u32, command: String) {
    println!("[Tile {r},{c}] Submitting job...");

    let response = match http
        .post(format!("{base}/rpc/submit_job"))
        .json(&JobRequest {
            command,
            env: HashMap::new(),
        })
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            println!("[Tile {r},{c}] Failed to submit: {e}");
            return;
        }
    };

    let submitted: JobResponse = match response.json().await {
        Ok(body) => body,
        Err(e) => {
            println!("[Tile {r},{c}] Failed to submit: {e}");
            return;
        }
    };

    loop {
        let response = match http
            .get(format!("{base}/rpc/job_status/{}", submitted.job_id))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                println!("[Tile {r},{c}] Status poll failed: {e}");
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
        };

        let status: JobStatusResponse = match response.json().await {
            Ok(body) => body,
            Err(_) => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
        };

        match status.status {
            JobStatus::Completed => {
                let worker = status
                    .worker_id
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("[Tile {r},{c}] Finished (Worker: {worker})");
                return;
            }
            JobStatus::Failed => {
                println!("[Tile {r},{c}] Failed: {}", status.output);
                return;
            }
            _ => {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
}

fn default_renderer_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|dir| dir.join("renderer")))
        .unwrap_or_else(|| PathBuf::from("renderer"))
}
