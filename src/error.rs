//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::IdentityError;
use crate::repository::RepositoryError;
use crate::storage::StorageError;
use crate::tenancy::TenantError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid bearer token")]
    InvalidToken,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid tenant context")]
    InvalidTenant,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("File is required")]
    MissingFile,

    #[error("Unsupported file type")]
    UnsupportedFileType,

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    #[error("Token request failed: {0}")]
    TokenRejected(String),

    // Upstream / availability errors (5xx)
    #[error("Tenant schema is not migrated")]
    SchemaNotMigrated,

    #[error("Unable to reach identity provider")]
    IdentityProviderUnavailable,

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidToken | AppError::TokenRejected(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InvalidTenant
            | AppError::InvalidRequest(_)
            | AppError::MissingFile
            | AppError::UnsupportedFileType => StatusCode::BAD_REQUEST,
            AppError::ReportNotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::SchemaNotMigrated => StatusCode::SERVICE_UNAVAILABLE,
            AppError::IdentityProviderUnavailable => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidToken => "invalid_token",
            AppError::Forbidden => "forbidden",
            AppError::InvalidTenant => "invalid_tenant",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::MissingFile => "missing_file",
            AppError::UnsupportedFileType => "unsupported_file_type",
            AppError::ReportNotFound(_) => "report_not_found",
            AppError::RateLimited { .. } => "rate_limit_exceeded",
            AppError::TokenRejected(_) => "token_rejected",
            AppError::SchemaNotMigrated => "schema_not_migrated",
            AppError::IdentityProviderUnavailable => "identity_provider_unavailable",
            AppError::Database(_) => "database_error",
            AppError::Storage(_) => "storage_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        let (error, details) = match &self {
            AppError::InvalidRequest(msg) => (self.to_string(), Some(msg.clone())),
            AppError::ReportNotFound(id) => (self.to_string(), Some(id.clone())),
            // The provider's own description is the useful message here.
            AppError::TokenRejected(detail) => (detail.clone(), None),

            // 5xx: log the cause, keep it out of the body
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                ("Internal server error".to_string(), None)
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                ("Internal server error".to_string(), None)
            }
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::SchemaMissing(detail) => {
                tracing::warn!(detail = %detail, "Schema not migrated");
                AppError::SchemaNotMigrated
            }
            RepositoryError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<TenantError> for AppError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::NotFound => AppError::InvalidTenant,
            TenantError::SchemaNotMigrated(_) => AppError::SchemaNotMigrated,
            TenantError::Repository(e) => e.into(),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Rejected(detail) => AppError::TokenRejected(detail),
            IdentityError::Unreachable(_) => AppError::IdentityProviderUnavailable,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::ReportNotFound(key),
            other => AppError::Storage(other.to_string()),
        }
    }
}
