//! clash_arena - server entry point.
//!
//! Wires together the coordination store, wallet/stats/audit
//! persistence, the matchmaking and round-resolution engines, and the
//! HTTP/WebSocket gateway, then serves until shutdown.

use std::sync::Arc;

use clash_arena::audit::{self, PgAuditSink};
use clash_arena::clock::SystemClock;
use clash_arena::config::AppConfig;
use clash_arena::db::Database;
use clash_arena::events::EventDispatcher;
use clash_arena::gateway;
use clash_arena::logging::init_logging;
use clash_arena::match_engine::RoundEngine;
use clash_arena::matchmaking::{Admission, MatchAssembler, QueueManager};
use clash_arena::recovery::Recovery;
use clash_arena::settlement::{PgStatsRepo, Settlement};
use clash_arena::store::RedisStore;
use clash_arena::timers::{ShutdownSignal, TimerService};
use clash_arena::user_auth::UserAuthService;
use clash_arena::wallet::PgWalletRepo;
use clash_arena::websocket::ConnectionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(AppConfig::from_env());
    let _log_guard = init_logging(&config);

    tracing::info!(bind_addr = %config.bind_addr, "starting clash_arena");

    let db = Database::connect(&config.database_url()).await?;
    let pool = db.pool().clone();

    let store: Arc<dyn clash_arena::store::KvStore> = Arc::new(RedisStore::connect(&config.redis_url()).await?);
    let wallet: Arc<dyn clash_arena::wallet::WalletRepo> = Arc::new(PgWalletRepo::new(pool.clone()));
    let stats: Arc<dyn clash_arena::settlement::StatsRepo> = Arc::new(PgStatsRepo::new(pool.clone()));
    let clock = Arc::new(SystemClock);
    let shutdown = Arc::new(ShutdownSignal::new());

    let audit: Arc<dyn audit::AuditSink> = Arc::new(audit::spawn_worker(PgAuditSink::new(pool.clone()), 1024));

    let ws_manager = Arc::new(ConnectionManager::new());
    let events = Arc::new(EventDispatcher::new(ws_manager.clone()));

    let queue = Arc::new(QueueManager::new(store.clone(), clock.clone()));
    let settlement = Arc::new(Settlement::new(wallet.clone(), stats, audit.clone(), clock.clone(), config.clone()));
    let round_engine = Arc::new(RoundEngine::new(store.clone(), audit.clone(), clock.clone(), settlement, events.clone()));

    let assembler = Arc::new(MatchAssembler::new(
        store.clone(),
        wallet.clone(),
        queue.clone(),
        round_engine.clone(),
        events.clone(),
        audit.clone(),
        clock.clone(),
        config.clone(),
    ));

    let admission = Arc::new(Admission::new(store.clone(), wallet.clone(), queue.clone(), assembler.clone(), clock.clone()));

    let timer_service = Arc::new(TimerService::new(store.clone(), round_engine.clone(), assembler.clone(), clock.clone(), shutdown.clone()));
    // Breaks the construction-order cycle: the round engine needs a
    // timer handle to arm move deadlines, but the timer service needs
    // the round engine to exist first.
    round_engine.set_timer_service(timer_service.clone());
    timer_service.spawn_recurring();

    let recovery = Arc::new(Recovery::new(store.clone(), queue.clone(), round_engine.clone(), wallet.clone()));
    let user_auth = Arc::new(UserAuthService::new(wallet.clone(), config.jwt_secret.clone()));

    let state = gateway::state::AppState::new(
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
        config.clone(),
        shutdown,
    );

    gateway::run_server(state, &config.bind_addr).await
}
