//! OpenAPI / Swagger UI documentation.
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::{
    CleanupOrphanedRequest, MoveRequest, QuickPlayRequest, QuickPlayResponse, ReconcileResponse, WalletResponse,
};
use crate::recovery::{CleanupResult, Reconciliation};
use crate::user_auth::service::GuestSignInResponse;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clash Arena API",
        version = "1.0.0",
        description = "Real-time rock-paper-scissors matchmaking, round resolution, and wallet service.",
        license(name = "MIT")
    ),
    servers((url = "http://localhost:8080", description = "Development")),
    paths(
        crate::gateway::handlers::health_check,
        crate::user_auth::handlers::guest_sign_in,
        crate::gateway::handlers::quick_play,
        crate::gateway::handlers::active_state,
        crate::gateway::handlers::get_ticket,
        crate::gateway::handlers::fallback_ticket,
        crate::gateway::handlers::get_match,
        crate::gateway::handlers::submit_move,
        crate::gateway::handlers::cleanup_orphaned,
        crate::gateway::handlers::get_wallet,
        crate::gateway::handlers::reset_frozen,
        crate::gateway::handlers::reconcile_wallet,
    ),
    components(
        schemas(
            GuestSignInResponse,
            QuickPlayRequest,
            QuickPlayResponse,
            MoveRequest,
            CleanupOrphanedRequest,
            CleanupResult,
            Reconciliation,
            WalletResponse,
            ReconcileResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Guest account creation"),
        (name = "Matchmaking", description = "Queueing, match lifecycle, and moves"),
        (name = "Wallet", description = "Balance queries and recovery tools"),
        (name = "System", description = "Health checks"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Clash Arena API");
    }

    #[test]
    fn openapi_json_serializable() {
        let spec = ApiDoc::openapi();
        assert!(spec.to_json().is_ok());
    }

    #[test]
    fn public_endpoints_registered() {
        let spec = ApiDoc::openapi();
        let paths = spec.paths;
        assert!(paths.paths.contains_key("/api/v1/health"));
        assert!(paths.paths.contains_key("/matchmaking/quickplay"));
        assert!(paths.paths.contains_key("/wallet"));
    }

    #[test]
    fn security_scheme_registered() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("should have components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
