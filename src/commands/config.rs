//! Config command.

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::Config;
use crate::errors::AppResult;

/// Loading already validated the environment; print what was loaded.
pub fn execute(args: ConfigArgs, config: &Config) -> AppResult<()> {
    match args.action {
        ConfigAction::Check => {
            println!("Configuration OK\n");
            println!("{:#?}", config);

            let providers = config.providers.configured();
            if providers.is_empty() {
                println!("\nNo external providers configured.");
            } else {
                println!("\nConfigured providers: {}", providers.join(", "));
            }
            Ok(())
        }
    }
}
