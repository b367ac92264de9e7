// HTTP API Error Types
use axum::http::StatusCode;
use thiserror::Error;

/// Public error taxonomy for a request.
///
/// Each variant fixes the HTTP status and the message a caller is allowed to
/// see. Internal detail (SQL errors, offending attributes) travels separately
/// on the baton's error records and is only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    // 500, parameter coercion/validation failed
    #[error("Parameter validation error")]
    ParameterValidation,

    // 401, missing, malformed or expired token
    #[error("Auth token invalid")]
    AuthTokenInvalid,

    // 500, role has no edge to the requested action
    #[error("Permission Denied")]
    PermissionDenied,

    // 500, user creation/login rule violations carry their own message
    #[error("{0}")]
    Domain(String),

    // 500, storage failures never expose internal detail
    #[error("Database Error")]
    Storage,

    // 500, a pipeline stage exceeded its deadline
    #[error("Request timed out")]
    Timeout,
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthTokenInvalid => StatusCode::UNAUTHORIZED,
            ApiError::ParameterValidation
            | ApiError::PermissionDenied
            | ApiError::Domain(_)
            | ApiError::Storage
            | ApiError::Timeout => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get client-safe error message
    pub fn public_message(&self) -> String {
        self.to_string()
    }

    pub fn domain(message: impl Into<String>) -> Self {
        ApiError::Domain(message.into())
    }

    /// Get error code for log correlation
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::ParameterValidation => "PARAMETER_VALIDATION",
            ApiError::AuthTokenInvalid => "AUTH_TOKEN_INVALID",
            ApiError::PermissionDenied => "PERMISSION_DENIED",
            ApiError::Domain(_) => "DOMAIN",
            ApiError::Storage => "STORAGE",
            ApiError::Timeout => "TIMEOUT",
        }
    }
}
