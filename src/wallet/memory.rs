//! In-memory [`WalletRepo`] double for engine tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{Wallet, WalletRepo, WalletTx};
use crate::core_types::UserId;
use crate::error::EngineError;

#[derive(Clone, Default)]
pub struct InMemoryWalletRepo {
    wallets: Arc<Mutex<HashMap<UserId, Wallet>>>,
}

impl InMemoryWalletRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a wallet balance directly, for test setup.
    pub fn seed(&self, user_id: UserId, balance_avail: i64) {
        self.wallets.lock().unwrap().insert(
            user_id,
            Wallet {
                user_id,
                balance_avail,
                balance_frozen: 0,
            },
        );
    }
}

#[async_trait]
impl WalletRepo for InMemoryWalletRepo {
    async fn begin(&self) -> Result<Box<dyn WalletTx>, EngineError> {
        Ok(Box::new(InMemoryWalletTx {
            wallets: self.wallets.clone(),
            overlay: HashMap::new(),
        }))
    }

    async fn get(&self, user_id: UserId) -> Result<Wallet, EngineError> {
        Ok(self
            .wallets
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .unwrap_or(Wallet {
                user_id,
                balance_avail: 0,
                balance_frozen: 0,
            }))
    }
}

struct InMemoryWalletTx {
    wallets: Arc<Mutex<HashMap<UserId, Wallet>>>,
    overlay: HashMap<UserId, Wallet>,
}

#[async_trait]
impl WalletTx for InMemoryWalletTx {
    async fn get_for_update(&mut self, user_id: UserId) -> Result<Wallet, EngineError> {
        if let Some(w) = self.overlay.get(&user_id) {
            return Ok(*w);
        }
        let wallet = self
            .wallets
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .unwrap_or(Wallet {
                user_id,
                balance_avail: 0,
                balance_frozen: 0,
            });
        self.overlay.insert(user_id, wallet);
        Ok(wallet)
    }

    async fn set_balances(
        &mut self,
        user_id: UserId,
        balance_avail: i64,
        balance_frozen: i64,
    ) -> Result<(), EngineError> {
        self.overlay.insert(
            user_id,
            Wallet {
                user_id,
                balance_avail,
                balance_frozen,
            },
        );
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), EngineError> {
        let mut wallets = self.wallets.lock().unwrap();
        for (user_id, wallet) in self.overlay {
            wallets.insert(user_id, wallet);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), EngineError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_applies_overlay_rollback_discards_it() {
        let repo = InMemoryWalletRepo::new();
        repo.seed(1, 1000);

        let mut tx = repo.begin().await.unwrap();
        let w = tx.get_for_update(1).await.unwrap();
        tx.set_balances(1, w.balance_avail - 100, w.balance_frozen + 100)
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(repo.get(1).await.unwrap().balance_avail, 1000);

        let mut tx = repo.begin().await.unwrap();
        let w = tx.get_for_update(1).await.unwrap();
        tx.set_balances(1, w.balance_avail - 100, w.balance_frozen + 100)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let w = repo.get(1).await.unwrap();
        assert_eq!(w.balance_avail, 900);
        assert_eq!(w.balance_frozen, 100);
    }
}
