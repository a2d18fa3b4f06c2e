//! Background jobs: queues, the worker, and the beat scheduler.

pub mod beat;
pub mod queue;
pub mod tasks;
pub mod worker;

pub use beat::{run_beat, BeatState, ScheduleEntry, SCHEDULE};
pub use queue::{enqueue, queue_depths, vacuum_all, JobQueue, SystemJob, SystemTask};
pub use worker::{fetch_report, handle_system_job, run_worker, JobOutcome, JobReport, WorkerContext};
