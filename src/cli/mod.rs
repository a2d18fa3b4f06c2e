//! Command-line interface.
//!
//! - `serve` - HTTP server
//! - `jobs` - worker, beat scheduler and queue management
//! - `config` - configuration checks

pub mod args;

pub use args::{Cli, Commands};
