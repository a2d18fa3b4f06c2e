//! Application configuration
//!
//! Typed settings loaded from the environment, plus shared constants.

mod constants;
mod settings;

pub use constants::*;
pub use settings::{
    CacheTtlSettings, Config, FileStorageSettings, JobSettings, ProviderKeys, RateLimitBackend,
    RateLimitSettings, RedisConfig, RedisSettings, SecuritySettings, SupabaseSettings, ENV_VARS,
};
