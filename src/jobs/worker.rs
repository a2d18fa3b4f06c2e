//! Job worker.
//!
//! One apalis worker per queue over the Redis storage. Each job runs under
//! a soft and a hard time limit and its report is kept in Redis for an hour.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use apalis::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{timeout, Instant};
use uuid::Uuid;

use super::queue::{JobQueue, SystemJob, SystemTask};
use super::tasks::{
    check_external_apis, collect_system_metrics, health_check, HttpReachability, Reachability,
};
use crate::config::{
    Config, CACHE_PREFIX_JOB_RESULT, JOB_RESULT_TTL_SECONDS, TASK_HARD_TIME_LIMIT_SECONDS,
    TASK_SOFT_TIME_LIMIT_SECONDS, WORKER_SHUTDOWN_TIMEOUT_SECONDS,
};
use crate::errors::{AppError, AppResult};
use crate::infra::{Cache, Database, HealthProbe};
use crate::shutdown::shutdown_signal;

/// Shared handles available to every job.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<Config>,
    pub cache: Cache,
    pub database: Database,
    pub reach: Arc<dyn Reachability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Success,
    Failure,
}

/// Stored result of one job run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub task: SystemTask,
    pub origin: String,
    pub outcome: JobOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn job_result_key(job_id: &Uuid) -> String {
    format!("{}{}", CACHE_PREFIX_JOB_RESULT, job_id)
}

pub async fn store_report(cache: &Cache, report: &JobReport) -> AppResult<()> {
    cache
        .set_with_ttl(&job_result_key(&report.job_id), report, JOB_RESULT_TTL_SECONDS)
        .await
}

pub async fn fetch_report(cache: &Cache, job_id: &Uuid) -> AppResult<Option<JobReport>> {
    cache.get(&job_result_key(job_id)).await
}

/// Await `work`, warning once it passes `soft` and failing it at `hard`.
pub async fn run_with_limits<F, T>(task: &str, soft: Duration, hard: Duration, work: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    tokio::pin!(work);

    if let Ok(result) = timeout(soft, &mut work).await {
        return result;
    }

    tracing::warn!(
        task = %task,
        soft_limit_secs = soft.as_secs_f64(),
        "Task exceeded soft time limit"
    );

    match timeout(hard.saturating_sub(soft), &mut work).await {
        Ok(result) => result,
        Err(_) => Err(AppError::job(format!(
            "{} exceeded hard time limit of {}s",
            task,
            hard.as_secs()
        ))),
    }
}

async fn run_task(ctx: &WorkerContext, job: &SystemJob) -> AppResult<Value> {
    let value = match job.task {
        SystemTask::HealthCheck => {
            let probes: Vec<Arc<dyn HealthProbe>> = vec![
                Arc::new(ctx.cache.clone()),
                Arc::new(ctx.database.clone()),
            ];
            serde_json::to_value(health_check(job.id, &ctx.config.environment, &probes).await)
        }
        SystemTask::ExternalApis => serde_json::to_value(
            check_external_apis(job.id, &ctx.config.providers, ctx.reach.as_ref()).await,
        ),
        SystemTask::MetricsCollection => serde_json::to_value(
            collect_system_metrics(job.id, &ctx.cache, &ctx.database).await,
        ),
    };

    value.map_err(|e| AppError::job(format!("Failed to serialize {} report: {}", job.task, e)))
}

/// apalis handler for every system queue.
pub async fn handle_system_job(job: SystemJob, ctx: Data<WorkerContext>) -> Result<(), AppError> {
    let started_at = Utc::now();
    let clock = Instant::now();
    tracing::info!(job_id = %job.id, task = %job.task, origin = %job.origin, "Job started");

    let outcome = run_with_limits(
        job.task.name(),
        Duration::from_secs(TASK_SOFT_TIME_LIMIT_SECONDS),
        Duration::from_secs(TASK_HARD_TIME_LIMIT_SECONDS),
        run_task(&ctx, &job),
    )
    .await;

    let (result, error) = match &outcome {
        Ok(value) => (Some(value.clone()), None),
        Err(e) => (None, Some(e.to_string())),
    };
    let report = JobReport {
        job_id: job.id,
        task: job.task,
        origin: job.origin.clone(),
        outcome: if outcome.is_ok() {
            JobOutcome::Success
        } else {
            JobOutcome::Failure
        },
        started_at,
        finished_at: Utc::now(),
        duration_ms: clock.elapsed().as_millis() as u64,
        result,
        error,
    };

    if let Err(e) = store_report(&ctx.cache, &report).await {
        tracing::warn!(job_id = %job.id, error = %e, "Failed to store job result");
    }

    match outcome {
        Ok(_) => {
            tracing::info!(job_id = %job.id, task = %job.task, duration_ms = report.duration_ms, "Job succeeded");
            Ok(())
        }
        Err(e) => {
            tracing::error!(job_id = %job.id, task = %job.task, error = %e, "Job failed");
            Err(e)
        }
    }
}

/// Consume the given queues until a shutdown signal arrives.
pub async fn run_worker(config: Arc<Config>, queues: &[JobQueue], concurrency: usize) -> AppResult<()> {
    let cache = Cache::connect_with_retry(&config).await?;
    let database = Database::connect(&config).await?;
    let reach: Arc<dyn Reachability> = Arc::new(HttpReachability::new()?);

    let ctx = WorkerContext {
        config: config.clone(),
        cache: cache.clone(),
        database: database.clone(),
        reach,
    };

    let mut monitor = Monitor::new();
    for queue in queues {
        let worker = WorkerBuilder::new(format!("plantcare-{}", queue.name()))
            .concurrency(concurrency.max(1))
            .data(ctx.clone())
            .backend(queue.storage(&cache))
            .build_fn(handle_system_job);
        monitor = monitor.register(worker);
        tracing::info!(queue = %queue, namespace = %queue.namespace(), concurrency, "Worker registered");
    }

    tracing::info!("Job worker started. Press Ctrl+C to stop.");

    supervise(
        monitor,
        shutdown_signal(),
        Duration::from_secs(WORKER_SHUTDOWN_TIMEOUT_SECONDS),
    )
    .await?;

    database.close().await?;
    tracing::info!("Job worker stopped.");
    Ok(())
}

/// Run the monitor until `signal` resolves, then let in-flight jobs finish.
///
/// Jobs still running after `grace` are abandoned.
pub async fn supervise<S>(monitor: Monitor, signal: S, grace: Duration) -> AppResult<()>
where
    S: Future<Output = ()> + Send,
{
    monitor
        .shutdown_timeout(grace)
        .run_with_signal(async {
            signal.await;
            tracing::info!("Received shutdown signal, draining in-flight jobs...");
            Ok(())
        })
        .await
        .map_err(|e| AppError::job(format!("Worker failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Progress {
        started: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
    }

    async fn slow_job(_n: u32, progress: Data<Progress>) -> Result<(), AppError> {
        progress.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        progress.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_lets_in_flight_job_finish() {
        let mut storage = MemoryStorage::<u32>::new();
        storage.enqueue(1).await.unwrap();

        let progress = Progress::default();
        let worker = WorkerBuilder::new("drain-test")
            .data(progress.clone())
            .backend(storage)
            .build_fn(slow_job);
        let monitor = Monitor::new().register(worker);

        let started = progress.started.clone();
        let signal = async move {
            while started.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };

        supervise(monitor, signal, Duration::from_secs(5)).await.unwrap();
        assert_eq!(progress.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fast_task_passes_through() {
        let result = run_with_limits(
            "quick",
            Duration::from_millis(50),
            Duration::from_millis(100),
            async { Ok::<_, AppError>(7) },
        )
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_task_past_soft_limit_still_completes() {
        let result = run_with_limits(
            "slowish",
            Duration::from_millis(20),
            Duration::from_millis(500),
            async {
                tokio::time::sleep(Duration::from_millis(60)).await;
                Ok::<_, AppError>("done")
            },
        )
        .await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_task_past_hard_limit_fails() {
        let result = run_with_limits(
            "stuck",
            Duration::from_millis(10),
            Duration::from_millis(30),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, AppError>(())
            },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), "JOB_ERROR");
        assert!(err.to_string().contains("hard time limit"));
    }

    #[test]
    fn test_job_result_key() {
        let id = Uuid::nil();
        assert_eq!(
            job_result_key(&id),
            "job_result:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_report_omits_empty_fields() {
        let now = Utc::now();
        let report = JobReport {
            job_id: Uuid::new_v4(),
            task: SystemTask::HealthCheck,
            origin: "cli".into(),
            outcome: JobOutcome::Failure,
            started_at: now,
            finished_at: now,
            duration_ms: 3,
            result: None,
            error: Some("boom".into()),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "failure");
        assert!(json.get("result").is_none());
    }
}
