//! Jobs command - worker, scheduler and queue management.
//!
//! ```bash
//! plantcare jobs work --concurrency 4
//! plantcare jobs beat
//! plantcare jobs enqueue health-check
//! plantcare jobs list
//! plantcare jobs result <id>
//! ```

use std::sync::Arc;

use uuid::Uuid;

use crate::cli::args::{JobsAction, JobsArgs};
use crate::config::Config;
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::Cache;
use crate::jobs::beat::{self, BeatState};
use crate::jobs::{
    enqueue, fetch_report, queue_depths, run_beat, run_worker, vacuum_all, JobQueue, SystemTask,
};

/// Execute the jobs command
pub async fn execute(args: JobsArgs, config: Arc<Config>) -> AppResult<()> {
    match args.action {
        JobsAction::Work { concurrency, queues } => {
            let queues = if queues.is_empty() {
                JobQueue::ALL.to_vec()
            } else {
                queues
            };
            let concurrency = concurrency.unwrap_or(config.jobs.worker_concurrency);
            run_worker(config, &queues, concurrency).await
        }
        JobsAction::Beat => run_beat(config).await,
        JobsAction::Enqueue { task } => enqueue_task(&config, task).await,
        JobsAction::List => list_jobs(&config).await,
        JobsAction::Clear => clear_jobs(&config).await,
        JobsAction::Result { id } => show_result(&config, id).await,
    }
}

async fn enqueue_task(config: &Config, task: SystemTask) -> AppResult<()> {
    let cache = Cache::try_connect(config).await?;
    let job = enqueue(&cache, task, "cli").await?;
    println!("Enqueued {} on {} as {}", task, task.queue(), job.id);
    Ok(())
}

async fn list_jobs(config: &Config) -> AppResult<()> {
    let cache = Cache::try_connect(config).await?;
    let depths = queue_depths(&cache).await?;

    println!("\n=== Job Queue Status ===");
    for (queue, pending) in &depths {
        println!("{:<15} {}", queue.name(), pending);
    }

    let path = beat::state_path(&config.jobs.beat_state_dir);
    let state = BeatState::load(&path).await?;

    println!("\n=== Beat Schedule ===");
    for entry in beat::SCHEDULE {
        let runs = state.entries.get(entry.name);
        let last = runs
            .and_then(|s| s.last_run_at)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<22} {:<16} runs={:<6} last={}",
            entry.name,
            entry.cron,
            runs.map(|s| s.runs).unwrap_or(0),
            last
        );
    }
    println!("========================\n");

    Ok(())
}

async fn clear_jobs(config: &Config) -> AppResult<()> {
    let cache = Cache::try_connect(config).await?;
    let removed = vacuum_all(&cache).await?;
    println!("Cleared {} finished job(s) from the queues.", removed);
    Ok(())
}

async fn show_result(config: &Config, id: Uuid) -> AppResult<()> {
    let cache = Cache::try_connect(config).await?;
    let report = fetch_report(&cache, &id)
        .await?
        .ok_or_not_found(format!("Result for job {}", id))?;

    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| AppError::internal(format!("Failed to encode job result: {}", e)))?;
    println!("{}", json);
    Ok(())
}
