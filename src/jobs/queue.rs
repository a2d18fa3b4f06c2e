//! Job queues and the broker payload.
//!
//! Each queue is its own apalis namespace on the shared Redis broker.

use std::collections::BTreeMap;
use std::fmt;

use apalis::prelude::Storage;
use apalis_redis::{Config as StorageConfig, RedisStorage};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::QUEUE_NAMESPACE_PREFIX;
use crate::errors::AppResult;
use crate::infra::Cache;

/// Broker queue, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum JobQueue {
    HighPriority,
    Default,
    LowPriority,
}

impl JobQueue {
    pub const ALL: [JobQueue; 3] = [
        JobQueue::HighPriority,
        JobQueue::Default,
        JobQueue::LowPriority,
    ];

    pub fn name(self) -> &'static str {
        match self {
            JobQueue::HighPriority => "high_priority",
            JobQueue::Default => "default",
            JobQueue::LowPriority => "low_priority",
        }
    }

    /// Broker namespace, e.g. `plantcare:high_priority`.
    pub fn namespace(self) -> String {
        format!("{}:{}", QUEUE_NAMESPACE_PREFIX, self.name())
    }

    /// Job storage for this queue over the shared connection.
    pub fn storage(self, cache: &Cache) -> RedisStorage<SystemJob> {
        let config = StorageConfig::default().set_namespace(&self.namespace());
        RedisStorage::new_with_config(cache.connection(), config)
    }
}

impl fmt::Display for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Work the system can run in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SystemTask {
    /// Broker and database liveness
    HealthCheck,
    /// Third-party provider reachability
    ExternalApis,
    /// Redis, queue and database counters
    MetricsCollection,
}

impl SystemTask {
    pub fn name(self) -> &'static str {
        match self {
            SystemTask::HealthCheck => "health_check",
            SystemTask::ExternalApis => "check_external_apis",
            SystemTask::MetricsCollection => "collect_system_metrics",
        }
    }

    /// Queue the task is routed to.
    pub fn queue(self) -> JobQueue {
        match self {
            SystemTask::HealthCheck => JobQueue::HighPriority,
            SystemTask::ExternalApis => JobQueue::Default,
            SystemTask::MetricsCollection => JobQueue::LowPriority,
        }
    }
}

impl fmt::Display for SystemTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Broker payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemJob {
    pub id: Uuid,
    pub task: SystemTask,
    pub enqueued_at: DateTime<Utc>,
    /// Who enqueued the job, e.g. `beat:system-health-check` or `cli`
    pub origin: String,
}

impl SystemJob {
    pub fn new(task: SystemTask, origin: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            enqueued_at: Utc::now(),
            origin: origin.into(),
        }
    }
}

/// Push a new job onto the queue its task routes to.
pub async fn enqueue(cache: &Cache, task: SystemTask, origin: &str) -> AppResult<SystemJob> {
    let job = SystemJob::new(task, origin);
    let mut storage = task.queue().storage(cache);

    storage.push(job.clone()).await?;

    tracing::info!(
        job_id = %job.id,
        task = %task,
        queue = %task.queue(),
        origin = %origin,
        "Job enqueued"
    );
    Ok(job)
}

/// Pending job count per queue.
pub async fn queue_depths(cache: &Cache) -> AppResult<BTreeMap<JobQueue, i64>> {
    let mut depths = BTreeMap::new();
    for queue in JobQueue::ALL {
        let mut storage = queue.storage(cache);
        depths.insert(queue, storage.len().await?);
    }
    Ok(depths)
}

/// Remove finished jobs from every queue. Returns the number removed.
pub async fn vacuum_all(cache: &Cache) -> AppResult<usize> {
    let mut removed = 0;
    for queue in JobQueue::ALL {
        let mut storage = queue.storage(cache);
        removed += storage.vacuum().await?;
    }
    Ok(removed)
}
