use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::gateway::state::AppState;
use crate::gateway::types::response::ApiError;

/// Extracts `Authorization: Bearer <token>`, verifies it against
/// `state.user_auth`, and injects the resulting [`super::Claims`] into
/// the request's extensions for downstream handlers to read.
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, 2001, "missing Authorization header").into_response())?;

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, 2002, "invalid token format").into_response());
    };

    match state.user_auth.verify_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(_) => Err(ApiError::new(StatusCode::UNAUTHORIZED, 2002, "invalid or expired token").into_response()),
    }
}
