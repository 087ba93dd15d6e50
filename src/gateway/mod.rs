pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::user_auth::middleware::jwt_auth_middleware;
use crate::websocket::ws_handler;
use state::AppState;

/// Start the HTTP/WebSocket gateway and serve until the listener
/// errors or the process is killed.
pub async fn run_server(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let state = Arc::new(state);

    let matchmaking_routes = Router::new()
        .route("/quickplay", post(handlers::quick_play))
        .route("/active", get(handlers::active_state))
        .route("/ticket/{id}", get(handlers::get_ticket))
        .route("/ticket/{id}/fallback", post(handlers::fallback_ticket))
        .route("/match/{id}/move", post(handlers::submit_move))
        .route("/cleanup-orphaned", post(handlers::cleanup_orphaned))
        .layer(axum::middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
        // A match snapshot is safe to read without proving ownership -
        // every player's client polls the same public state.
        .route("/match/{id}", get(handlers::get_match));

    let wallet_routes = Router::new()
        .route("/", get(handlers::get_wallet))
        .route("/reset-frozen", post(handlers::reset_frozen))
        .route("/reconcile", get(handlers::reconcile_wallet))
        .layer(axum::middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    let auth_routes = Router::new().route("/guest", post(crate::user_auth::handlers::guest_sign_in));

    let app = Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .route("/ws", get(ws_handler))
        .nest("/auth", auth_routes)
        .nest("/matchmaking", matchmaking_routes)
        .nest("/wallet", wallet_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()));

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "gateway listening");
    tracing::info!("API docs: http://{bind_addr}/docs");

    axum::serve(listener, app).await?;
    Ok(())
}
