use std::sync::Arc;

use crate::audit::AuditSink;
use crate::config::AppConfig;
use crate::match_engine::RoundEngine;
use crate::matchmaking::{Admission, MatchAssembler, QueueManager};
use crate::recovery::Recovery;
use crate::store::KvStore;
use crate::timers::{ShutdownSignal, TimerService};
use crate::user_auth::UserAuthService;
use crate::wallet::WalletRepo;
use crate::websocket::ConnectionManager;

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub wallet: Arc<dyn WalletRepo>,
    pub queue: Arc<QueueManager>,
    pub admission: Arc<Admission>,
    pub assembler: Arc<MatchAssembler>,
    pub round_engine: Arc<RoundEngine>,
    pub timer_service: Arc<TimerService>,
    pub recovery: Arc<Recovery>,
    pub audit: Arc<dyn AuditSink>,
    /// WebSocket connection manager
    pub ws_manager: Arc<ConnectionManager>,
    pub user_auth: Arc<UserAuthService>,
    pub config: Arc<AppConfig>,
    pub shutdown: Arc<ShutdownSignal>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn KvStore>,
        wallet: Arc<dyn WalletRepo>,
        queue: Arc<QueueManager>,
        admission: Arc<Admission>,
        assembler: Arc<MatchAssembler>,
        round_engine: Arc<RoundEngine>,
        timer_service: Arc<TimerService>,
        recovery: Arc<Recovery>,
        audit: Arc<dyn AuditSink>,
        ws_manager: Arc<ConnectionManager>,
        user_auth: Arc<UserAuthService>,
        config: Arc<AppConfig>,
        shutdown: Arc<ShutdownSignal>,
    ) -> Self {
        Self {
            store,
            wallet,
            queue,
            admission,
            assembler,
            round_engine,
            timer_service,
            recovery,
            audit,
            ws_manager,
            user_auth,
            config,
            shutdown,
        }
    }
}
