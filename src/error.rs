//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::ConfigError;

// == Cache Error Enum ==
/// Unified error type for the cache engine and server.
///
/// A rejected admission is not an error; `set` reports it as `Ok(false)`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Entry cost is larger than the shard it maps to
    #[error("Value too large: cost {cost} exceeds shard capacity {capacity}")]
    ValueTooLarge { cost: u64, capacity: u64 },

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Engine configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::ValueTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Config(_) | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let cases = vec![
            (CacheError::InvalidKey("empty".into()), StatusCode::BAD_REQUEST),
            (
                CacheError::ValueTooLarge {
                    cost: 10,
                    capacity: 5,
                },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (
                CacheError::Config(ConfigError::ZeroShards),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (CacheError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_value_too_large_message() {
        let error = CacheError::ValueTooLarge {
            cost: 10,
            capacity: 5,
        };
        assert_eq!(
            error.to_string(),
            "Value too large: cost 10 exceeds shard capacity 5"
        );
    }
}
