//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::config::Config;
use crate::jobs::{JobQueue, SystemTask};

/// Plant Care API - HTTP service, job worker and scheduler
#[derive(Parser, Debug)]
#[command(name = "plantcare")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Run and manage background jobs
    Jobs(JobsArgs),

    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind to [default: APP_HOST or 0.0.0.0]
    #[arg(short = 'H', long, env = "APP_HOST")]
    pub host: Option<String>,

    /// Port to listen on [default: APP_PORT or 8000]
    #[arg(short, long, env = "APP_PORT")]
    pub port: Option<u16>,
}

impl ServeArgs {
    /// Flags win; anything unset comes from the loaded configuration.
    pub fn bind_addr(&self, config: &Config) -> String {
        format!(
            "{}:{}",
            self.host.as_deref().unwrap_or(&config.app_host),
            self.port.unwrap_or(config.app_port)
        )
    }
}

#[derive(Args, Debug)]
pub struct JobsArgs {
    #[command(subcommand)]
    pub action: JobsAction,
}

#[derive(Subcommand, Debug)]
pub enum JobsAction {
    /// Consume jobs from the broker
    Work {
        /// Concurrent jobs per queue [default: WORKER_CONCURRENCY or 2]
        #[arg(short, long, env = "WORKER_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Queues to consume (repeatable). Defaults to all.
        #[arg(short, long = "queue", value_enum)]
        queues: Vec<JobQueue>,
    },
    /// Run the periodic scheduler
    Beat,
    /// Push one system task onto its queue
    Enqueue {
        #[arg(value_enum)]
        task: SystemTask,
    },
    /// Show queue depths and scheduler state
    List,
    /// Remove finished jobs from every queue
    Clear,
    /// Print the stored result of a job
    Result { id: Uuid },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the environment and print the redacted configuration
    Check,
}
