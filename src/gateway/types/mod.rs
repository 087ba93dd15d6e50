//! Gateway response types: the unified `ApiResponse<T>` envelope and
//! `ApiError` used by every HTTP handler.

pub mod response;

pub use response::{ApiError, ApiResponse, ApiResult, error_codes};
