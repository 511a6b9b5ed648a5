//! Error Types for the evcrest gateway
//!
//! This module defines error handling for the HTTP layer:
//! - ApiError struct carrying a code and a message
//! - ErrorCode enum mapping each error category to a status code
//! - IntoResponse implementation for Axum HTTP responses
//!
//! Client errors are rendered as plain text so callers see the message.
//! Server errors are logged and answered with an empty body.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use evcrest_core::{
    CacheOperationError, ClientConstructionError, GatewayError, InputError, TenantId,
};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required query parameter is missing
    MissingField,

    /// Value is out of valid range
    InvalidRange,

    /// Value has the wrong format
    InvalidFormat,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Key is not cached, or is cached with an empty payload
    KeyNotFound,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// The cache client raised while submitting an operation
    CacheOperationFailed,

    /// A write was submitted but no server group acknowledged it
    WriteFailed,

    /// The tenant's cache client could not be built
    ClientConstructionFailed,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidRange
            | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,

            ErrorCode::KeyNotFound => StatusCode::NOT_FOUND,

            ErrorCode::CacheOperationFailed
            | ErrorCode::WriteFailed
            | ErrorCode::ClientConstructionFailed
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Error returned by every gateway handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// The key is absent for this tenant.
    pub fn key_not_found(key: &str, tenant: &TenantId) -> Self {
        Self::new(
            ErrorCode::KeyNotFound,
            format!("Key {} Not Found in cache {}", key, tenant),
        )
    }

    /// A write missed its quorum without any group acknowledging.
    pub fn write_failed(key: &str, tenant: &TenantId) -> Self {
        Self::new(
            ErrorCode::WriteFailed,
            format!("Set Operation for Key - {} failed for {}", key, tenant),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = %self.code, error = %self.message, "Request failed");
            return status.into_response();
        }
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self.message),
        )
            .into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        let code = match &err {
            InputError::MissingTtl { .. } => ErrorCode::MissingField,
            InputError::InvalidTtl { .. } => ErrorCode::InvalidRange,
            InputError::InvalidFlag { .. } => ErrorCode::InvalidFormat,
            InputError::EmptyTenant => ErrorCode::InvalidInput,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<CacheOperationError> for ApiError {
    fn from(err: CacheOperationError) -> Self {
        ApiError::new(ErrorCode::CacheOperationFailed, err.to_string())
    }
}

impl From<ClientConstructionError> for ApiError {
    fn from(err: ClientConstructionError) -> Self {
        ApiError::new(ErrorCode::ClientConstructionFailed, err.to_string())
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Input(e) => e.into(),
            GatewayError::CacheOperation(e) => e.into(),
            GatewayError::ClientConstruction(e) => e.into(),
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use evcrest_core::CacheOperation;

    async fn body_text(response: Response) -> Result<String, String> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| format!("Failed to read body: {:?}", e))?;
        String::from_utf8(bytes.to_vec()).map_err(|e| format!("Body is not UTF-8: {}", e))
    }

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::MissingField.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidRange.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidFormat.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::KeyNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::WriteFailed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ErrorCode::CacheOperationFailed.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::ClientConstructionFailed.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_input_errors_map_to_bad_request() {
        let err: ApiError = InputError::MissingTtl { key: "k".into() }.into();
        assert_eq!(err.code, ErrorCode::MissingField);
        assert_eq!(err.message, "Please specify ttl for the key k as query parameter ");

        let err: ApiError = InputError::InvalidFlag {
            key: "k".into(),
            value: "x".into(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_gateway_errors_map_to_server_errors() {
        let err: ApiError =
            GatewayError::from(CacheOperationError::new(CacheOperation::Read, "k", "down")).into();
        assert_eq!(err.code, ErrorCode::CacheOperationFailed);

        let err: ApiError = GatewayError::from(ClientConstructionError::new("APP", "refused")).into();
        assert_eq!(err.code, ErrorCode::ClientConstructionFailed);
    }

    #[tokio::test]
    async fn test_client_error_renders_plain_text() -> Result<(), String> {
        let tenant = TenantId::parse("movies").map_err(|e| e.to_string())?;
        let response = ApiError::key_not_found("title:1", &tenant).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        assert_eq!(content_type.as_deref(), Some("text/plain; charset=utf-8"));
        assert_eq!(body_text(response).await?, "Key title:1 Not Found in cache MOVIES\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_server_error_has_empty_body() -> Result<(), String> {
        let response = ApiError::internal_error("secret detail").into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await?, "");
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::invalid_input("bad port");
        let display = format!("{}", err);

        assert!(display.contains("InvalidInput"));
        assert!(display.contains("bad port"));
    }
}
