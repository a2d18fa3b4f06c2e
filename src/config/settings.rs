//! Application settings loaded from environment variables.
//!
//! Every variable read here is listed in [`ENV_VARS`] and must have a
//! placeholder in `.env.example`.

use std::env;
use std::fmt;
use std::str::FromStr;

use super::constants::*;
use crate::errors::{AppError, AppResult};

/// Every environment variable the application reads.
pub const ENV_VARS: &[&str] = &[
    // Application
    "ENVIRONMENT",
    "DEBUG",
    "APP_HOST",
    "APP_PORT",
    "ALLOWED_HOSTS",
    // Supabase / database
    "SUPABASE_URL",
    "SUPABASE_ANON_KEY",
    "SUPABASE_SERVICE_ROLE_KEY",
    "SUPABASE_DB_PASSWORD",
    "DATABASE_URL",
    // Security
    "JWT_SECRET_KEY",
    "JWT_ALGORITHM",
    "JWT_ACCESS_TOKEN_EXPIRE_MINUTES",
    "JWT_REFRESH_TOKEN_EXPIRE_DAYS",
    "ADMIN_SECRET_KEY",
    // Redis
    "REDIS_URL",
    "REDIS_MAX_CONNECTIONS",
    "REDIS_CONNECTION_TIMEOUT",
    // Plant identification
    "PLANTNET_API_KEY",
    "PLANT_ID_API_KEY",
    "TREFLE_API_KEY",
    "KINDWISE_API_KEY",
    // Weather
    "OPENWEATHER_API_KEY",
    "TOMORROW_IO_API_KEY",
    "WEATHERSTACK_API_KEY",
    "VISUAL_CROSSING_API_KEY",
    // Payments
    "RAZORPAY_KEY_ID",
    "RAZORPAY_KEY_SECRET",
    "STRIPE_PUBLISHABLE_KEY",
    "STRIPE_SECRET_KEY",
    "STRIPE_WEBHOOK_SECRET",
    // Notifications
    "FCM_PROJECT_ID",
    "FCM_PRIVATE_KEY_ID",
    "FCM_PRIVATE_KEY",
    "FCM_CLIENT_EMAIL",
    "FCM_CLIENT_ID",
    "SENDGRID_API_KEY",
    "SENDGRID_FROM_EMAIL",
    "SENDGRID_FROM_NAME",
    "TELEGRAM_BOT_TOKEN",
    // AI
    "OPENAI_API_KEY",
    "OPENAI_ORG_ID",
    "GEMINI_API_KEY",
    "CLAUDE_API_KEY",
    // Translation
    "GOOGLE_TRANSLATE_API_KEY",
    "DEEPL_API_KEY",
    "AZURE_TRANSLATOR_KEY",
    "AZURE_TRANSLATOR_REGION",
    // Analytics & monitoring
    "MIXPANEL_PROJECT_TOKEN",
    "GA_MEASUREMENT_ID",
    "SENTRY_DSN",
    // Rate limiting & caching
    "DEFAULT_RATE_LIMIT_PER_HOUR",
    "DEFAULT_RATE_LIMIT_BURST",
    "RATE_LIMIT_REQUESTS",
    "RATE_LIMIT_WINDOW_SECONDS",
    "RATE_LIMIT_BACKEND",
    "CACHE_TTL_PLANT_LIBRARY",
    "CACHE_TTL_WEATHER_DATA",
    "CACHE_TTL_API_RESPONSES",
    // File storage
    "MAX_IMAGE_SIZE_MB",
    "MAX_FILE_SIZE_MB",
    "ALLOWED_IMAGE_EXTENSIONS",
    "ALLOWED_FILE_EXTENSIONS",
    // Background jobs
    "WORKER_CONCURRENCY",
    "BEAT_STATE_DIR",
];

/// Where rate-limit windows are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackend {
    /// Shared across API replicas
    Redis,
    /// Per process
    Memory,
}

impl FromStr for RateLimitBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown rate limit backend '{}'", other)),
        }
    }
}

/// Supabase project settings
#[derive(Clone)]
pub struct SupabaseSettings {
    pub url: String,
    service_role_key: String,
    db_password: Option<String>,
}

impl SupabaseSettings {
    pub fn service_role_key(&self) -> &str {
        &self.service_role_key
    }

    /// Project reference, e.g. `abcd` for `https://abcd.supabase.co`.
    pub fn project_ref(&self) -> &str {
        let host = self
            .url
            .strip_prefix(SUPABASE_URL_SCHEME)
            .unwrap_or(&self.url);
        host.split(SUPABASE_HOST_SUFFIX).next().unwrap_or(host)
    }
}

impl fmt::Debug for SupabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseSettings")
            .field("url", &self.url)
            .field("service_role_key", &"[REDACTED]")
            .field("db_password", &self.db_password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Token lifetimes. The signing secrets are validated at load and not kept.
#[derive(Debug, Clone)]
pub struct SecuritySettings {
    pub jwt_algorithm: String,
    pub jwt_access_token_expire_minutes: u64,
    pub jwt_refresh_token_expire_days: u64,
}

/// Redis connection settings
#[derive(Clone)]
pub struct RedisSettings {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
}

impl fmt::Debug for RedisSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSettings")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("connection_timeout_seconds", &self.connection_timeout_seconds)
            .finish()
    }
}

/// Optional third-party credentials. Unset or empty values are `None`.
#[derive(Clone, Default)]
pub struct ProviderKeys {
    pub plantnet: Option<String>,
    pub plant_id: Option<String>,
    pub trefle: Option<String>,
    pub kindwise: Option<String>,
    pub openweather: Option<String>,
    pub tomorrow_io: Option<String>,
    pub weatherstack: Option<String>,
    pub visual_crossing: Option<String>,
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<String>,
    pub stripe_publishable_key: Option<String>,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub fcm_project_id: Option<String>,
    pub fcm_private_key_id: Option<String>,
    pub fcm_private_key: Option<String>,
    pub fcm_client_email: Option<String>,
    pub fcm_client_id: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from_email: Option<String>,
    pub sendgrid_from_name: String,
    pub telegram_bot_token: Option<String>,
    pub openai: Option<String>,
    pub openai_org_id: Option<String>,
    pub gemini: Option<String>,
    pub claude: Option<String>,
    pub google_translate: Option<String>,
    pub deepl: Option<String>,
    pub azure_translator_key: Option<String>,
    pub azure_translator_region: Option<String>,
    pub mixpanel_project_token: Option<String>,
    pub ga_measurement_id: Option<String>,
    pub sentry_dsn: Option<String>,
}

impl ProviderKeys {
    fn entries(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("plantnet", self.plantnet.is_some()),
            ("plant_id", self.plant_id.is_some()),
            ("trefle", self.trefle.is_some()),
            ("kindwise", self.kindwise.is_some()),
            ("openweather", self.openweather.is_some()),
            ("tomorrow_io", self.tomorrow_io.is_some()),
            ("weatherstack", self.weatherstack.is_some()),
            ("visual_crossing", self.visual_crossing.is_some()),
            ("razorpay", self.razorpay_key_id.is_some()),
            ("stripe", self.stripe_secret_key.is_some()),
            ("fcm", self.fcm_project_id.is_some()),
            ("sendgrid", self.sendgrid_api_key.is_some()),
            ("telegram", self.telegram_bot_token.is_some()),
            ("openai", self.openai.is_some()),
            ("gemini", self.gemini.is_some()),
            ("claude", self.claude.is_some()),
            ("google_translate", self.google_translate.is_some()),
            ("deepl", self.deepl.is_some()),
            ("azure_translator", self.azure_translator_key.is_some()),
            ("mixpanel", self.mixpanel_project_token.is_some()),
            ("google_analytics", self.ga_measurement_id.is_some()),
            ("sentry", self.sentry_dsn.is_some()),
        ]
    }

    /// Names of providers with credentials present.
    pub fn configured(&self) -> Vec<&'static str> {
        self.entries()
            .into_iter()
            .filter_map(|(name, set)| set.then_some(name))
            .collect()
    }
}

impl fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderKeys")
            .field("configured", &self.configured())
            .field("sendgrid_from_name", &self.sendgrid_from_name)
            .finish()
    }
}

/// Request throttling settings
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub per_hour: u64,
    pub burst: u64,
    pub requests: u64,
    pub window_seconds: u64,
    pub backend: RateLimitBackend,
}

/// Cache TTLs in seconds
#[derive(Debug, Clone)]
pub struct CacheTtlSettings {
    pub plant_library: u64,
    pub weather_data: u64,
    pub api_responses: u64,
}

/// Upload limits
#[derive(Debug, Clone)]
pub struct FileStorageSettings {
    pub max_image_size_mb: u64,
    pub max_file_size_mb: u64,
    pub allowed_image_extensions: Vec<String>,
    pub allowed_file_extensions: Vec<String>,
}

impl FileStorageSettings {
    /// Largest accepted request body in bytes.
    pub fn max_body_bytes(&self) -> usize {
        (self.max_file_size_mb as usize).saturating_mul(1024 * 1024)
    }

    pub fn is_allowed_image(&self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        self.allowed_image_extensions.iter().any(|e| *e == ext)
    }

}

/// Background job settings
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub worker_concurrency: usize,
    pub beat_state_dir: String,
}

/// Redis connection parameters as a single view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub environment: String,
    pub debug: bool,
    pub app_host: String,
    pub app_port: u16,
    pub allowed_hosts: Vec<String>,
    pub supabase: SupabaseSettings,
    database_url: Option<String>,
    pub security: SecuritySettings,
    pub redis: RedisSettings,
    pub providers: ProviderKeys,
    pub rate_limit: RateLimitSettings,
    pub cache_ttl: CacheTtlSettings,
    pub files: FileStorageSettings,
    pub jobs: JobSettings,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("debug", &self.debug)
            .field("app_host", &self.app_host)
            .field("app_port", &self.app_port)
            .field("allowed_hosts", &self.allowed_hosts)
            .field("supabase", &self.supabase)
            .field("database_url", &"[REDACTED]")
            .field("security", &self.security)
            .field("redis", &self.redis)
            .field("providers", &self.providers)
            .field("rate_limit", &self.rate_limit)
            .field("cache_ttl", &self.cache_ttl)
            .field("files", &self.files)
            .field("jobs", &self.jobs)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvReader { lookup };

        let url = validate_supabase_url(vars.required("SUPABASE_URL")?)?;
        // Issued to app clients; the service itself uses the service-role key.
        vars.required("SUPABASE_ANON_KEY")?;
        let supabase = SupabaseSettings {
            url,
            service_role_key: vars.required("SUPABASE_SERVICE_ROLE_KEY")?,
            db_password: vars.optional("SUPABASE_DB_PASSWORD"),
        };

        validate_secret("JWT_SECRET_KEY", vars.required("JWT_SECRET_KEY")?)?;
        validate_secret("ADMIN_SECRET_KEY", vars.required("ADMIN_SECRET_KEY")?)?;
        let security = SecuritySettings {
            jwt_algorithm: vars.string("JWT_ALGORITHM", DEFAULT_JWT_ALGORITHM),
            jwt_access_token_expire_minutes: vars.parse(
                "JWT_ACCESS_TOKEN_EXPIRE_MINUTES",
                DEFAULT_JWT_ACCESS_TOKEN_EXPIRE_MINUTES,
            )?,
            jwt_refresh_token_expire_days: vars.parse(
                "JWT_REFRESH_TOKEN_EXPIRE_DAYS",
                DEFAULT_JWT_REFRESH_TOKEN_EXPIRE_DAYS,
            )?,
        };

        let redis = RedisSettings {
            url: vars.string("REDIS_URL", DEFAULT_REDIS_URL),
            max_connections: vars.parse("REDIS_MAX_CONNECTIONS", DEFAULT_REDIS_MAX_CONNECTIONS)?,
            connection_timeout_seconds: vars.parse(
                "REDIS_CONNECTION_TIMEOUT",
                DEFAULT_REDIS_CONNECTION_TIMEOUT_SECONDS,
            )?,
        };

        let providers = ProviderKeys {
            plantnet: vars.optional("PLANTNET_API_KEY"),
            plant_id: vars.optional("PLANT_ID_API_KEY"),
            trefle: vars.optional("TREFLE_API_KEY"),
            kindwise: vars.optional("KINDWISE_API_KEY"),
            openweather: vars.optional("OPENWEATHER_API_KEY"),
            tomorrow_io: vars.optional("TOMORROW_IO_API_KEY"),
            weatherstack: vars.optional("WEATHERSTACK_API_KEY"),
            visual_crossing: vars.optional("VISUAL_CROSSING_API_KEY"),
            razorpay_key_id: vars.optional("RAZORPAY_KEY_ID"),
            razorpay_key_secret: vars.optional("RAZORPAY_KEY_SECRET"),
            stripe_publishable_key: vars.optional("STRIPE_PUBLISHABLE_KEY"),
            stripe_secret_key: vars.optional("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: vars.optional("STRIPE_WEBHOOK_SECRET"),
            fcm_project_id: vars.optional("FCM_PROJECT_ID"),
            fcm_private_key_id: vars.optional("FCM_PRIVATE_KEY_ID"),
            fcm_private_key: vars.optional("FCM_PRIVATE_KEY"),
            fcm_client_email: vars.optional("FCM_CLIENT_EMAIL"),
            fcm_client_id: vars.optional("FCM_CLIENT_ID"),
            sendgrid_api_key: vars.optional("SENDGRID_API_KEY"),
            sendgrid_from_email: vars.optional("SENDGRID_FROM_EMAIL"),
            sendgrid_from_name: vars.string("SENDGRID_FROM_NAME", DEFAULT_SENDGRID_FROM_NAME),
            telegram_bot_token: vars.optional("TELEGRAM_BOT_TOKEN"),
            openai: vars.optional("OPENAI_API_KEY"),
            openai_org_id: vars.optional("OPENAI_ORG_ID"),
            gemini: vars.optional("GEMINI_API_KEY"),
            claude: vars.optional("CLAUDE_API_KEY"),
            google_translate: vars.optional("GOOGLE_TRANSLATE_API_KEY"),
            deepl: vars.optional("DEEPL_API_KEY"),
            azure_translator_key: vars.optional("AZURE_TRANSLATOR_KEY"),
            azure_translator_region: vars.optional("AZURE_TRANSLATOR_REGION"),
            mixpanel_project_token: vars.optional("MIXPANEL_PROJECT_TOKEN"),
            ga_measurement_id: vars.optional("GA_MEASUREMENT_ID"),
            sentry_dsn: vars.optional("SENTRY_DSN"),
        };

        let rate_limit = RateLimitSettings {
            per_hour: vars.parse("DEFAULT_RATE_LIMIT_PER_HOUR", DEFAULT_RATE_LIMIT_PER_HOUR)?,
            burst: vars.parse("DEFAULT_RATE_LIMIT_BURST", DEFAULT_RATE_LIMIT_BURST)?,
            requests: vars.parse("RATE_LIMIT_REQUESTS", RATE_LIMIT_REQUESTS)?,
            window_seconds: vars.parse("RATE_LIMIT_WINDOW_SECONDS", RATE_LIMIT_WINDOW_SECONDS)?,
            backend: vars.parse("RATE_LIMIT_BACKEND", RateLimitBackend::Redis)?,
        };
        if rate_limit.requests == 0 || rate_limit.window_seconds == 0 {
            return Err(AppError::configuration(
                "RATE_LIMIT_REQUESTS and RATE_LIMIT_WINDOW_SECONDS must be positive",
            ));
        }

        let cache_ttl = CacheTtlSettings {
            plant_library: vars.parse("CACHE_TTL_PLANT_LIBRARY", DEFAULT_CACHE_TTL_PLANT_LIBRARY)?,
            weather_data: vars.parse("CACHE_TTL_WEATHER_DATA", DEFAULT_CACHE_TTL_WEATHER_DATA)?,
            api_responses: vars.parse("CACHE_TTL_API_RESPONSES", DEFAULT_CACHE_TTL_API_RESPONSES)?,
        };

        let files = FileStorageSettings {
            max_image_size_mb: vars.parse("MAX_IMAGE_SIZE_MB", DEFAULT_MAX_IMAGE_SIZE_MB)?,
            max_file_size_mb: vars.parse("MAX_FILE_SIZE_MB", DEFAULT_MAX_FILE_SIZE_MB)?,
            allowed_image_extensions: vars
                .list("ALLOWED_IMAGE_EXTENSIONS", DEFAULT_ALLOWED_IMAGE_EXTENSIONS)
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            allowed_file_extensions: vars
                .list("ALLOWED_FILE_EXTENSIONS", DEFAULT_ALLOWED_FILE_EXTENSIONS)
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        };

        let jobs = JobSettings {
            worker_concurrency: vars.parse("WORKER_CONCURRENCY", DEFAULT_WORKER_CONCURRENCY)?,
            beat_state_dir: vars.string("BEAT_STATE_DIR", DEFAULT_BEAT_STATE_DIR),
        };

        Ok(Self {
            environment: vars.string("ENVIRONMENT", DEFAULT_ENVIRONMENT),
            debug: vars.flag("DEBUG", DEFAULT_DEBUG)?,
            app_host: vars.string("APP_HOST", DEFAULT_APP_HOST),
            app_port: vars.parse("APP_PORT", DEFAULT_APP_PORT)?,
            allowed_hosts: vars.list("ALLOWED_HOSTS", DEFAULT_ALLOWED_HOSTS),
            supabase,
            database_url: vars.optional("DATABASE_URL"),
            security,
            redis,
            providers,
            rate_limit,
            cache_ttl,
            files,
            jobs,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Postgres connection URL.
    ///
    /// `DATABASE_URL` wins; otherwise the Supabase direct-connection host is used.
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let credentials = match &self.supabase.db_password {
            Some(password) => format!("postgres:{}", password),
            None => "postgres".to_string(),
        };
        format!(
            "postgresql://{}@db.{}{}:5432/postgres",
            credentials,
            self.supabase.project_ref(),
            SUPABASE_HOST_SUFFIX
        )
    }

    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.redis.url.clone(),
            max_connections: self.redis.max_connections,
            connection_timeout: self.redis.connection_timeout_seconds,
        }
    }
}

/// Typed access over a variable lookup function.
struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed, non-empty value.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> AppResult<String> {
        self.optional(key)
            .ok_or_else(|| AppError::configuration(format!("{} must be set", key)))
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|e| {
                AppError::configuration(format!("{} has invalid value '{}': {}", key, raw, e))
            }),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> AppResult<bool> {
        match self.optional(key) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(AppError::configuration(format!(
                    "{} must be a boolean, got '{}'",
                    key, raw
                ))),
            },
            None => Ok(default),
        }
    }

    /// Comma-separated list; empty entries are dropped.
    fn list(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.optional(key) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn validate_supabase_url(url: String) -> AppResult<String> {
    if !url.starts_with(SUPABASE_URL_SCHEME) {
        return Err(AppError::configuration(
            "Supabase URL must start with https://",
        ));
    }
    if !url.contains(SUPABASE_HOST_SUFFIX) {
        return Err(AppError::configuration("Invalid Supabase URL format"));
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn validate_secret(key: &str, secret: String) -> AppResult<()> {
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(AppError::configuration(format!(
            "{} must be at least {} characters long",
            key, MIN_SECRET_LENGTH
        )));
    }
    Ok(())
}
