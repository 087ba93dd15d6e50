//! HTTP handlers for the matchmaking and wallet surface.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

use crate::core_types::{Choice, Id, PartySize, Stake, UserId};
use crate::matchmaking::admission::QuickPlayOutcome;
use crate::recovery::CleanupResult;
use crate::user_auth::Claims;
use crate::wallet::Wallet;

use super::state::AppState;
use super::types::response::{ApiError, ApiResult, accepted, ok};

fn claims_user_id(claims: &Claims) -> Result<UserId, ApiError> {
    claims.sub.parse().map_err(|_| ApiError::unauthorized("malformed subject claim"))
}

/// Process liveness / readiness probe.
///
/// GET /api/v1/health
pub async fn health_check() -> ApiResult<&'static str> {
    ok("ok")
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct QuickPlayRequest {
    pub players_count: PartySize,
    pub stake_vp: Stake,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuickPlayResponse {
    Queued {
        #[schema(value_type = String)]
        ticket_id: Id,
    },
    AlreadyInQueue {
        #[schema(value_type = String)]
        ticket_id: Id,
    },
    AlreadyInMatch {
        #[schema(value_type = String)]
        match_id: Id,
    },
}

impl From<QuickPlayOutcome> for QuickPlayResponse {
    fn from(outcome: QuickPlayOutcome) -> Self {
        match outcome {
            QuickPlayOutcome::Queued { ticket_id } => QuickPlayResponse::Queued { ticket_id },
            QuickPlayOutcome::AlreadyInQueue { ticket_id } => QuickPlayResponse::AlreadyInQueue { ticket_id },
            QuickPlayOutcome::AlreadyInMatch { match_id } => QuickPlayResponse::AlreadyInMatch { match_id },
        }
    }
}

/// Join (or resume) the matchmaking queue for a party size and stake.
///
/// POST /matchmaking/quickplay
#[utoipa::path(
    post,
    path = "/matchmaking/quickplay",
    request_body = QuickPlayRequest,
    responses(
        (status = 201, description = "Queued or already engaged", body = QuickPlayResponse),
        (status = 400, description = "Invalid party size, stake, or insufficient balance"),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    tag = "Matchmaking",
    security(("bearer_auth" = []))
)]
pub async fn quick_play(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<QuickPlayRequest>,
) -> ApiResult<QuickPlayResponse> {
    let user_id = claims_user_id(&claims).map_err(|e| e.into_err::<QuickPlayResponse>().unwrap_err())?;
    req.validate().map_err(|e| ApiError::bad_request(e.to_string()))?;

    match state.admission.quick_play(user_id, req.players_count, req.stake_vp, req.display_name).await {
        Ok(outcome) => accepted(QuickPlayResponse::from(outcome)),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Recover what the caller is currently doing: queued, in a match, or idle.
///
/// GET /matchmaking/active
#[utoipa::path(
    get,
    path = "/matchmaking/active",
    responses((status = 200, description = "Current active-state snapshot")),
    tag = "Matchmaking",
    security(("bearer_auth" = []))
)]
pub async fn active_state(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<crate::recovery::ActiveState> {
    let user_id = claims_user_id(&claims).map_err(|e| e.into_err::<crate::recovery::ActiveState>().unwrap_err())?;
    match state.recovery.get_user_active_state(user_id).await {
        Ok(active) => ok(active),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Fetch a ticket, but only if it belongs to the caller. Foreign
/// tickets return 404, never 403, to avoid disclosure.
///
/// GET /matchmaking/ticket/:id
#[utoipa::path(
    get,
    path = "/matchmaking/ticket/{id}",
    params(("id" = String, Path, description = "Ticket id")),
    responses(
        (status = 200, description = "Ticket"),
        (status = 404, description = "Unknown, expired, or foreign ticket"),
    ),
    tag = "Matchmaking",
    security(("bearer_auth" = []))
)]
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(ticket_id): Path<Id>,
) -> ApiResult<crate::matchmaking::Ticket> {
    let user_id = claims_user_id(&claims).map_err(|e| e.into_err::<crate::matchmaking::Ticket>().unwrap_err())?;

    let raw = state
        .store
        .get(&crate::matchmaking::ticket::ticket_key(ticket_id))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let Some(raw) = raw else {
        return ApiError::not_found("ticket not found").into_err();
    };
    let ticket: crate::matchmaking::Ticket =
        serde_json::from_str(&raw).map_err(|e| ApiError::internal(e.to_string()))?;
    if ticket.user_id != user_id {
        return ApiError::not_found("ticket not found").into_err();
    }
    ok(ticket)
}

/// Force this ticket's queue down the bot-fallback path immediately,
/// instead of waiting out the 20s force-assemble window.
///
/// POST /matchmaking/ticket/:id/fallback
#[utoipa::path(
    post,
    path = "/matchmaking/ticket/{id}/fallback",
    params(("id" = String, Path, description = "Ticket id")),
    responses(
        (status = 202, description = "Fallback assembly attempted"),
        (status = 404, description = "Unknown, expired, or foreign ticket"),
    ),
    tag = "Matchmaking",
    security(("bearer_auth" = []))
)]
pub async fn fallback_ticket(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(ticket_id): Path<Id>,
) -> ApiResult<Option<Id>> {
    let user_id = claims_user_id(&claims).map_err(|e| e.into_err::<Option<Id>>().unwrap_err())?;

    let raw = state
        .store
        .get(&crate::matchmaking::ticket::ticket_key(ticket_id))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let Some(raw) = raw else {
        return ApiError::not_found("ticket not found").into_err();
    };
    let ticket: crate::matchmaking::Ticket =
        serde_json::from_str(&raw).map_err(|e| ApiError::internal(e.to_string()))?;
    if ticket.user_id != user_id {
        return ApiError::not_found("ticket not found").into_err();
    }

    match state.assembler.try_assemble(ticket.party_size, ticket.stake, true).await {
        Ok(match_id) => accepted(match_id),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Public match snapshot.
///
/// GET /matchmaking/match/:id
#[utoipa::path(
    get,
    path = "/matchmaking/match/{id}",
    params(("id" = String, Path, description = "Match id")),
    responses(
        (status = 200, description = "Match snapshot"),
        (status = 404, description = "Unknown match"),
    ),
    tag = "Matchmaking"
)]
pub async fn get_match(State(state): State<Arc<AppState>>, Path(match_id): Path<Id>) -> ApiResult<crate::match_engine::Match> {
    match state.round_engine.load(match_id).await {
        Ok(Some(m)) => ok(m),
        Ok(None) => ApiError::not_found("match not found").into_err(),
        Err(e) => ApiError::from(e).into_err(),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveRequest {
    #[serde(rename = "move")]
    #[schema(value_type = String)]
    pub choice: Choice,
}

/// Submit a move for the current round.
///
/// POST /matchmaking/match/:id/move
#[utoipa::path(
    post,
    path = "/matchmaking/match/{id}/move",
    params(("id" = String, Path, description = "Match id")),
    request_body = MoveRequest,
    responses(
        (status = 200, description = "Updated match"),
        (status = 400, description = "State-machine error (already moved, eliminated, finished)"),
    ),
    tag = "Matchmaking",
    security(("bearer_auth" = []))
)]
pub async fn submit_move(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(match_id): Path<Id>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<crate::match_engine::Match> {
    let user_id = claims_user_id(&claims).map_err(|e| e.into_err::<crate::match_engine::Match>().unwrap_err())?;

    if let Err(e) = state.round_engine.submit_move(match_id, user_id, req.choice).await {
        return ApiError::from(e).into_err();
    }
    match state.round_engine.load(match_id).await {
        Ok(Some(m)) => ok(m),
        Ok(None) => ApiError::not_found("match not found").into_err(),
        Err(e) => ApiError::from(e).into_err(),
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CleanupOrphanedRequest {
    #[validate(range(min = 1, max = 1440))]
    pub max_age_minutes: Option<i64>,
}

/// Cancel and refund the caller's own orphaned matches.
///
/// POST /matchmaking/cleanup-orphaned
#[utoipa::path(
    post,
    path = "/matchmaking/cleanup-orphaned",
    request_body = CleanupOrphanedRequest,
    responses((status = 200, description = "Cleanup summary", body = CleanupResult)),
    tag = "Matchmaking",
    security(("bearer_auth" = []))
)]
pub async fn cleanup_orphaned(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CleanupOrphanedRequest>,
) -> ApiResult<CleanupResult> {
    let user_id = claims_user_id(&claims).map_err(|e| e.into_err::<CleanupResult>().unwrap_err())?;
    req.validate().map_err(|e| ApiError::bad_request(e.to_string()))?;
    let max_age_secs = req.max_age_minutes.map(|m| m * 60);

    match state.recovery.check_and_cleanup_user_matches(user_id, max_age_secs).await {
        Ok(result) => ok(result),
        Err(e) => ApiError::from(e).into_err(),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletResponse {
    pub user_id: UserId,
    pub balance_avail: i64,
    pub balance_frozen: i64,
}

impl From<Wallet> for WalletResponse {
    fn from(w: Wallet) -> Self {
        Self { user_id: w.user_id, balance_avail: w.balance_avail, balance_frozen: w.balance_frozen }
    }
}

/// The caller's wallet balances.
///
/// GET /wallet
#[utoipa::path(
    get,
    path = "/wallet",
    responses((status = 200, description = "Wallet balances", body = WalletResponse)),
    tag = "Wallet",
    security(("bearer_auth" = []))
)]
pub async fn get_wallet(State(state): State<Arc<AppState>>, Extension(claims): Extension<Claims>) -> ApiResult<WalletResponse> {
    let user_id = claims_user_id(&claims).map_err(|e| e.into_err::<WalletResponse>().unwrap_err())?;
    match state.wallet.get(user_id).await {
        Ok(w) => ok(WalletResponse::from(w)),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Emergency unstick: move the caller's entire frozen balance back to
/// available. Intended for support-assisted recovery after a stuck
/// match, not a routine call.
///
/// POST /wallet/reset-frozen
#[utoipa::path(
    post,
    path = "/wallet/reset-frozen",
    responses((status = 200, description = "Balances after reset", body = WalletResponse)),
    tag = "Wallet",
    security(("bearer_auth" = []))
)]
pub async fn reset_frozen(State(state): State<Arc<AppState>>, Extension(claims): Extension<Claims>) -> ApiResult<WalletResponse> {
    let user_id = claims_user_id(&claims).map_err(|e| e.into_err::<WalletResponse>().unwrap_err())?;

    let mut tx = state.wallet.begin().await.map_err(ApiError::from)?;
    let wallet = tx.get_for_update(user_id).await.map_err(ApiError::from)?;
    let updated = Wallet { balance_avail: wallet.balance_avail + wallet.balance_frozen, balance_frozen: 0, ..wallet };
    tx.set_balances(user_id, updated.balance_avail, updated.balance_frozen).await.map_err(ApiError::from)?;
    tx.commit().await.map_err(ApiError::from)?;

    state.audit.record(
        crate::audit::AuditEvent::new("WALLET_FROZEN_RESET")
            .with_actor(user_id)
            .with_payload(serde_json::json!({ "released": wallet.balance_frozen })),
    );

    ok(WalletResponse::from(updated))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub user_id: UserId,
    pub balance_avail: i64,
    pub balance_frozen: i64,
    /// Sum of the stake this user has committed to currently active,
    /// real-money matches — what `balance_frozen` is expected to equal.
    pub expected_frozen: i64,
    /// `balance_frozen - expected_frozen`. Non-zero indicates drift
    /// worth investigating (a stuck match, a missed settlement).
    pub drift: i64,
}

/// Compare the caller's stored frozen balance against what their
/// currently-active matches should be holding.
///
/// GET /wallet/reconcile
#[utoipa::path(
    get,
    path = "/wallet/reconcile",
    responses((status = 200, description = "Expected vs. actual balance", body = ReconcileResponse)),
    tag = "Wallet",
    security(("bearer_auth" = []))
)]
pub async fn reconcile_wallet(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<ReconcileResponse> {
    let user_id = claims_user_id(&claims).map_err(|e| e.into_err::<ReconcileResponse>().unwrap_err())?;

    match state.recovery.reconcile_wallet(user_id).await {
        Ok(r) => ok(ReconcileResponse {
            user_id,
            balance_avail: r.balance_avail,
            balance_frozen: r.balance_frozen,
            expected_frozen: r.expected_frozen,
            drift: r.drift,
        }),
        Err(e) => ApiError::from(e).into_err(),
    }
}
