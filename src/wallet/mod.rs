//! Wallet store: the external transactional collaborator that holds
//! `{userId, balanceAvail, balanceFrozen}` rows.
//!
//! An explicit repository interface where a `Tx` handle is the only
//! mutator, backed by `SELECT ... FOR UPDATE` row locking, rather than
//! an ORM entity graph.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core_types::UserId;
use crate::error::EngineError;

pub use memory::InMemoryWalletRepo;
pub use pg::PgWalletRepo;

/// A wallet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance_avail: i64,
    pub balance_frozen: i64,
}

/// A held wallet-store transaction. Every mutation must go through a
/// handle obtained from [`WalletRepo::begin`]: this makes it
/// structurally impossible to mutate a row outside a transactional
/// boundary: wallet rows are only reachable from inside match- or
/// timer-scoped code paths, never concurrently from request handlers.
#[async_trait]
pub trait WalletTx: Send {
    /// Read a wallet row, taking a pessimistic row lock held until
    /// commit or rollback. Creates the row with a zero balance if it
    /// does not exist yet (first engagement for a user).
    async fn get_for_update(&mut self, user_id: UserId) -> Result<Wallet, EngineError>;

    /// Overwrite both balance fields for `user_id`.
    async fn set_balances(
        &mut self,
        user_id: UserId,
        balance_avail: i64,
        balance_frozen: i64,
    ) -> Result<(), EngineError>;

    async fn commit(self: Box<Self>) -> Result<(), EngineError>;
    async fn rollback(self: Box<Self>) -> Result<(), EngineError>;
}

/// Repository over the wallet store.
#[async_trait]
pub trait WalletRepo: Send + Sync {
    /// Begin a new transaction. All mutation happens through the
    /// returned handle.
    async fn begin(&self) -> Result<Box<dyn WalletTx>, EngineError>;

    /// Read a wallet without taking a lock — used by admission's
    /// balance check, which is explicitly lock-free (the wallet is
    /// re-checked and frozen transactionally at match assembly time).
    async fn get(&self, user_id: UserId) -> Result<Wallet, EngineError>;
}

/// Decrement `balance_frozen` by `amount`, saturating at 0 rather than
/// underflowing, for use during settlement and cancellation refunds.
pub fn saturating_consume_frozen(wallet: Wallet, amount: u64) -> Wallet {
    Wallet {
        balance_frozen: (wallet.balance_frozen - amount as i64).max(0),
        ..wallet
    }
}
