//! CLI command implementations, one module per subcommand.

pub mod config;
pub mod jobs;
pub mod serve;
