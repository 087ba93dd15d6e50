//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiResult<T>`: Type alias for handler return types
//! - `ApiError`: Unified error type with IntoResponse

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::EngineError;

/// Unified API response wrapper.
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "ok")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { code: 0, msg: "ok".to_string(), data: Some(data) }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse { code, msg: msg.into(), data: None }
    }
}

/// Type alias for handler return types.
pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), (StatusCode, Json<ApiResponse<()>>)>;

#[inline]
pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

#[inline]
pub fn accepted<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(data))))
}

/// Unified API error type with automatic `IntoResponse`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::BAD_INPUT, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::UNAUTHORIZED, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR, msg)
    }

    /// Convert to a handler error tuple.
    pub fn into_err<T>(self) -> ApiResult<T> {
        Err((self.status, Json(ApiResponse::<()>::error(self.code, self.message))))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(ApiResponse::<()>::error(self.code, self.message))).into_response()
    }
}

impl From<ApiError> for (StatusCode, Json<ApiResponse<()>>) {
    fn from(err: ApiError) -> Self {
        (err.status, Json(ApiResponse::<()>::error(err.code, err.message)))
    }
}

/// Maps each domain error to the HTTP status and reason code the
/// gateway layer exposes.
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match err {
            EngineError::BadInput(_) => StatusCode::BAD_REQUEST,
            EngineError::Unauthorized => StatusCode::UNAUTHORIZED,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Precondition(_) => StatusCode::BAD_REQUEST,
            EngineError::InsufficientBalance => StatusCode::BAD_REQUEST,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let code = match err {
            EngineError::BadInput(_) => error_codes::BAD_INPUT,
            EngineError::Unauthorized => error_codes::UNAUTHORIZED,
            EngineError::NotFound(_) => error_codes::NOT_FOUND,
            EngineError::Conflict(_) => error_codes::CONFLICT,
            EngineError::Precondition(_) => error_codes::PRECONDITION,
            EngineError::InsufficientBalance => error_codes::INSUFFICIENT_BALANCE,
            EngineError::Internal(_) => error_codes::INTERNAL_ERROR,
        };
        Self::new(status, code, err.to_string())
    }
}

/// Standard API error codes. Numeric values carry the reason code into
/// the JSON body so clients can branch without string-matching `msg`.
pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const BAD_INPUT: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const PRECONDITION: i32 = 1003;
    pub const UNAUTHORIZED: i32 = 2001;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const RATE_LIMITED: i32 = 4291;
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_moved_maps_to_bad_request_not_conflict() {
        let err: ApiError = EngineError::Precondition("AlreadyMoved".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, error_codes::PRECONDITION);
    }
}
