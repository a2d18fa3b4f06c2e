//! Centralized error handling.
//!
//! Provides a unified error type for the entire application,
//! with automatic HTTP response conversion. Every error renders as
//! `{"error": {"code", "message", "status_code", "request_id"}}`; the
//! request id is filled in by the request context middleware.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every internal-class error
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication & Authorization
    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    AuthorizationFailed(String),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Admin access required")]
    AdminAccessRequired,

    // Users
    #[error("User with ID {0} not found")]
    UserNotFound(String),

    #[error("User with email {0} already exists")]
    UserAlreadyExists(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account has been suspended")]
    AccountSuspended,

    // Plants
    #[error("Plant with ID {0} not found")]
    PlantNotFound(String),

    #[error("Plant limit of {0} exceeded. Upgrade to premium for unlimited plants.")]
    PlantLimitExceeded(u32),

    #[error("Plant identification failed: {0}")]
    PlantIdentificationFailed(String),

    #[error("Invalid plant data: {0}")]
    InvalidPlantData(String),

    // Subscriptions & payments
    #[error("Premium subscription required for {0}")]
    SubscriptionRequired(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Subscription not found")]
    SubscriptionNotFound,

    // External services
    #[error("{service} API error: {message}")]
    ExternalApi { service: String, message: String },

    #[error("Rate limit exceeded: {limit} requests per {window_seconds} seconds")]
    RateLimitExceeded {
        limit: u64,
        window_seconds: u64,
        retry_after: u64,
    },

    #[error("Invalid API key for {0}")]
    InvalidApiKey(String),

    // Files
    #[error("File upload failed: {0}")]
    FileUploadFailed(String),

    #[error("File size exceeds maximum allowed size of {0}MB")]
    FileSizeExceeded(u64),

    #[error("File type not allowed. Allowed types: {}", .0.join(", "))]
    InvalidFileType(Vec<String>),

    // Validation
    #[error("{0}")]
    Validation(String),

    #[error("Invalid host header")]
    InvalidHost,

    // Resource errors
    #[error("{0}")]
    NotFound(String),

    // Infrastructure
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    #[error("Database operation failed: {0}")]
    DatabaseOperation(String),

    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),

    #[error("Cache error")]
    Cache(#[from] redis::RedisError),

    #[error("Job error: {0}")]
    Job(String),

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response envelope
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

/// Error details, also attached to the response as an extension so the
/// request context middleware can stamp the request id.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub status_code: u16,
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorBody {
    /// Render as a JSON response with the given status.
    pub fn into_response_with(self, status: StatusCode) -> Response {
        let mut response = (
            status,
            Json(ErrorEnvelope {
                error: self.clone(),
            }),
        )
            .into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            AppError::AuthorizationFailed(_) => "AUTHORIZATION_FAILED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::AdminAccessRequired => "ADMIN_ACCESS_REQUIRED",
            AppError::UserNotFound(_) => "USER_NOT_FOUND",
            AppError::UserAlreadyExists(_) => "USER_ALREADY_EXISTS",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::AccountSuspended => "ACCOUNT_SUSPENDED",
            AppError::PlantNotFound(_) => "PLANT_NOT_FOUND",
            AppError::PlantLimitExceeded(_) => "PLANT_LIMIT_EXCEEDED",
            AppError::PlantIdentificationFailed(_) => "PLANT_IDENTIFICATION_FAILED",
            AppError::InvalidPlantData(_) => "INVALID_PLANT_DATA",
            AppError::SubscriptionRequired(_) => "SUBSCRIPTION_REQUIRED",
            AppError::PaymentFailed(_) => "PAYMENT_FAILED",
            AppError::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            AppError::ExternalApi { .. } => "EXTERNAL_API_ERROR",
            AppError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::InvalidApiKey(_) => "INVALID_API_KEY",
            AppError::FileUploadFailed(_) => "FILE_UPLOAD_FAILED",
            AppError::FileSizeExceeded(_) => "FILE_SIZE_EXCEEDED",
            AppError::InvalidFileType(_) => "INVALID_FILE_TYPE",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidHost => "INVALID_HOST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseConnection(_) => "DATABASE_CONNECTION_ERROR",
            AppError::DatabaseOperation(_) | AppError::Database(_) => "DATABASE_OPERATION_ERROR",
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::Job(_) => "JOB_ERROR",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationFailed(_)
            | AppError::InvalidToken
            | AppError::InvalidCredentials
            | AppError::InvalidApiKey(_) => StatusCode::UNAUTHORIZED,

            AppError::AuthorizationFailed(_)
            | AppError::AdminAccessRequired
            | AppError::AccountSuspended => StatusCode::FORBIDDEN,

            AppError::UserNotFound(_)
            | AppError::PlantNotFound(_)
            | AppError::SubscriptionNotFound
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            AppError::UserAlreadyExists(_) => StatusCode::CONFLICT,

            AppError::PlantLimitExceeded(_)
            | AppError::SubscriptionRequired(_)
            | AppError::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,

            AppError::PlantIdentificationFailed(_)
            | AppError::InvalidPlantData(_)
            | AppError::FileUploadFailed(_)
            | AppError::InvalidFileType(_)
            | AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,

            AppError::FileSizeExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidHost => StatusCode::BAD_REQUEST,

            AppError::ExternalApi { .. }
            | AppError::DatabaseConnection(_)
            | AppError::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,

            AppError::Configuration(_)
            | AppError::DatabaseOperation(_)
            | AppError::Database(_)
            | AppError::Job(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the detail must stay out of the response body.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Configuration(_)
                | AppError::DatabaseConnection(_)
                | AppError::DatabaseOperation(_)
                | AppError::Database(_)
                | AppError::Cache(_)
                | AppError::Job(_)
                | AppError::Internal(_)
        )
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        if !self.is_internal() {
            return self.to_string();
        }

        match self {
            AppError::Database(e) => tracing::error!(error = ?e, "Database error"),
            AppError::Cache(e) => tracing::error!(error = ?e, "Cache error"),
            other => tracing::error!(code = other.code(), "{}", other),
        }
        GENERIC_ERROR_MESSAGE.to_string()
    }

    /// Envelope body for this error, without a request id.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.user_message(),
            status_code: self.status().as_u16(),
            request_id: None,
            retry_after: match self {
                AppError::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
                _ => None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = self.body().into_response_with(self.status());

        if let AppError::RateLimitExceeded { retry_after, .. } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        response
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self, what: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, what: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", what.into())))
    }
}

/// Convenience constructors
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::Configuration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn job(msg: impl Into<String>) -> Self {
        AppError::Job(msg.into())
    }

    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ExternalApi {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
