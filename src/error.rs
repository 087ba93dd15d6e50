//! Domain error kinds shared across the engine.
//!
//! A `thiserror` enum carrying a reason code the HTTP layer maps to a
//! status code, rather than stringly-typed errors threaded through
//! `anyhow`.

use thiserror::Error;

/// Errors raised by the engine's pure operations (admission, round
/// resolution, settlement). The gateway layer maps each variant to an
/// HTTP status and a reason code string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable reason code for the HTTP response body.
    pub fn reason_code(&self) -> &'static str {
        match self {
            EngineError::BadInput(_) => "BadInput",
            EngineError::Unauthorized => "Unauthorized",
            EngineError::NotFound(_) => "NotFound",
            EngineError::Conflict(_) => "Conflict",
            EngineError::Precondition(_) => "Precondition",
            EngineError::InsufficientBalance => "InsufficientBalance",
            EngineError::Internal(_) => "Internal",
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Internal(format!("db error: {err}"))
    }
}

impl From<redis::RedisError> for EngineError {
    fn from(err: redis::RedisError) -> Self {
        EngineError::Internal(format!("store error: {err}"))
    }
}
