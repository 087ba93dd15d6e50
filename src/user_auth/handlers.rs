use axum::{Json, extract::State};
use std::sync::Arc;

use super::service::GuestSignInResponse;
use crate::gateway::state::AppState;
use crate::gateway::types::response::{ApiError, ApiResult, ok};

/// Create a new guest account and issue its bearer token.
///
/// POST /auth/guest
#[utoipa::path(
    post,
    path = "/auth/guest",
    responses(
        (status = 200, description = "Guest account created", body = GuestSignInResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "Auth"
)]
pub async fn guest_sign_in(State(state): State<Arc<AppState>>) -> ApiResult<GuestSignInResponse> {
    match state.user_auth.guest_sign_in().await {
        Ok(resp) => ok(resp),
        Err(e) => {
            tracing::error!(error = %e, "guest sign-in failed");
            ApiError::internal("failed to create guest account").into_err()
        }
    }
}
