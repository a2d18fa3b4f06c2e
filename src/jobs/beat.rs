//! Beat scheduler.
//!
//! Enqueues system jobs on a cron schedule and records every enqueue in a
//! JSON state file under `BEAT_STATE_DIR`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use super::queue::{enqueue, SystemTask};
use crate::config::{Config, BEAT_STATE_FILE};
use crate::errors::{AppError, AppResult};
use crate::infra::Cache;
use crate::shutdown::shutdown_signal;

/// A periodic job.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleEntry {
    pub name: &'static str,
    /// Six-field cron expression, seconds first
    pub cron: &'static str,
    pub task: SystemTask,
}

pub const SCHEDULE: &[ScheduleEntry] = &[ScheduleEntry {
    name: "system-health-check",
    cron: "0 */5 * * * *",
    task: SystemTask::HealthCheck,
}];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryState {
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_job_id: Option<Uuid>,
    pub runs: u64,
}

/// Persisted scheduler state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatState {
    pub entries: BTreeMap<String, EntryState>,
}

pub fn state_path(dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(BEAT_STATE_FILE)
}

impl BeatState {
    /// Read the state file. A missing or corrupt file is an empty state.
    pub async fn load(path: &Path) -> AppResult<Self> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(AppError::job(format!(
                    "Failed to read beat state {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                // The next save overwrites it.
                tracing::warn!(path = %path.display(), error = %e, "Corrupt beat state, starting fresh");
                Ok(Self::default())
            }
        }
    }

    /// Write through a temp file and rename so readers never see a partial file.
    pub async fn save(&self, path: &Path) -> AppResult<()> {
        let io_err = |e: std::io::Error| {
            AppError::job(format!("Failed to write beat state {}: {}", path.display(), e))
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| AppError::job(format!("Failed to encode beat state: {}", e)))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }

    pub fn record(&mut self, entry: &str, job_id: Uuid, at: DateTime<Utc>) {
        let state = self.entries.entry(entry.to_string()).or_default();
        state.last_run_at = Some(at);
        state.last_job_id = Some(job_id);
        state.runs += 1;
    }
}

/// Enqueue one scheduled entry and record it.
async fn fire(cache: &Cache, entry: ScheduleEntry, path: &Path, lock: &Mutex<()>) -> AppResult<()> {
    let origin = format!("beat:{}", entry.name);
    let job = enqueue(cache, entry.task, &origin).await?;

    let _guard = lock.lock().await;
    let mut state = BeatState::load(path).await?;
    state.record(entry.name, job.id, job.enqueued_at);
    state.save(path).await
}

fn scheduler_error(e: impl std::fmt::Display) -> AppError {
    AppError::job(format!("Scheduler error: {}", e))
}

/// Run the scheduler until a shutdown signal arrives.
pub async fn run_beat(config: Arc<Config>) -> AppResult<()> {
    let cache = Cache::connect_with_retry(&config).await?;
    let path = Arc::new(state_path(&config.jobs.beat_state_dir));
    let lock = Arc::new(Mutex::new(()));

    let mut scheduler = JobScheduler::new().await.map_err(scheduler_error)?;

    for entry in SCHEDULE {
        let entry = *entry;
        let cache = cache.clone();
        let path = path.clone();
        let lock = lock.clone();

        let job = Job::new_async(entry.cron, move |_uuid, _lock| {
            let cache = cache.clone();
            let path = path.clone();
            let lock = lock.clone();
            Box::pin(async move {
                match fire(&cache, entry, &path, &lock).await {
                    Ok(()) => tracing::debug!(entry = entry.name, "Beat entry fired"),
                    Err(e) => tracing::error!(entry = entry.name, error = %e, "Beat entry failed"),
                }
            })
        })
        .map_err(scheduler_error)?;

        scheduler.add(job).await.map_err(scheduler_error)?;
        tracing::info!(entry = entry.name, cron = entry.cron, task = %entry.task, "Beat entry scheduled");
    }

    scheduler.start().await.map_err(scheduler_error)?;
    tracing::info!(state = %path.display(), "Beat scheduler started. Press Ctrl+C to stop.");

    shutdown_signal().await;

    scheduler.shutdown().await.map_err(scheduler_error)?;
    tracing::info!("Beat scheduler stopped.");
    Ok(())
}
