//! Error types for gateway operations

use std::fmt;
use thiserror::Error;

/// Client input errors. These are the caller's fault and never reach the cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Please specify ttl for the key {key} as query parameter ")]
    MissingTtl { key: String },

    #[error("Invalid ttl '{value}' for the key {key}: expected a positive number of seconds")]
    InvalidTtl { key: String, value: String },

    #[error("Invalid flag '{value}' for the key {key}: expected a 32-bit integer")]
    InvalidFlag { key: String, value: String },

    #[error("Application id must not be empty")]
    EmptyTenant,
}

/// The cache operation that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    Write,
    Read,
    Delete,
}

impl CacheOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::Write => "write",
            CacheOperation::Read => "read",
            CacheOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The cache client raised while an operation was being submitted.
///
/// Distinct from a quorum shortfall: a write that was submitted and then
/// missed its quorum is a [`crate::WriteOutcome::Failure`], not this error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cache {operation} failed for key {key}: {reason}")]
pub struct CacheOperationError {
    pub operation: CacheOperation,
    pub key: String,
    pub reason: String,
}

impl CacheOperationError {
    pub fn new(operation: CacheOperation, key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            operation,
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// A tenant's cache client could not be built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to build cache client for {tenant}: {reason}")]
pub struct ClientConstructionError {
    pub tenant: String,
    pub reason: String,
}

impl ClientConstructionError {
    pub fn new(tenant: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            reason: reason.into(),
        }
    }
}

/// Master error type for all gateway errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    CacheOperation(#[from] CacheOperationError),

    #[error(transparent)]
    ClientConstruction(#[from] ClientConstructionError),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_ttl_message_matches_wire_text() {
        let err = InputError::MissingTtl {
            key: "user:42".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Please specify ttl for the key user:42 as query parameter "
        );
    }

    #[test]
    fn test_gateway_error_from_conversions() {
        let err: GatewayError = CacheOperationError::new(CacheOperation::Read, "k", "timeout").into();
        assert!(matches!(err, GatewayError::CacheOperation(_)));
        assert_eq!(err.to_string(), "Cache read failed for key k: timeout");

        let err: GatewayError = ClientConstructionError::new("MOVIES", "no servers").into();
        assert!(matches!(err, GatewayError::ClientConstruction(_)));
        assert!(err.to_string().contains("MOVIES"));

        let err: GatewayError = InputError::EmptyTenant.into();
        assert!(matches!(err, GatewayError::Input(InputError::EmptyTenant)));
    }
}
