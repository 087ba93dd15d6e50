//! PostgreSQL-backed [`WalletRepo`].

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::{Wallet, WalletRepo, WalletTx};
use crate::core_types::UserId;
use crate::error::EngineError;

pub struct PgWalletRepo {
    pool: PgPool,
}

impl PgWalletRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepo for PgWalletRepo {
    async fn begin(&self) -> Result<Box<dyn WalletTx>, EngineError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgWalletTx { tx: Some(tx) }))
    }

    async fn get(&self, user_id: UserId) -> Result<Wallet, EngineError> {
        let row = sqlx::query(
            "SELECT balance_avail, balance_frozen FROM wallets_tb WHERE user_id = $1",
        )
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Wallet {
                user_id,
                balance_avail: row.get("balance_avail"),
                balance_frozen: row.get("balance_frozen"),
            },
            None => Wallet {
                user_id,
                balance_avail: 0,
                balance_frozen: 0,
            },
        })
    }
}

struct PgWalletTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgWalletTx {
    fn tx_mut(&mut self) -> &mut Transaction<'static, Postgres> {
        self.tx.as_mut().expect("wallet tx used after commit/rollback")
    }
}

#[async_trait]
impl WalletTx for PgWalletTx {
    async fn get_for_update(&mut self, user_id: UserId) -> Result<Wallet, EngineError> {
        let row = sqlx::query(
            "SELECT balance_avail, balance_frozen FROM wallets_tb WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id as i64)
        .fetch_optional(&mut *self.tx_mut())
        .await?;

        if let Some(row) = row {
            return Ok(Wallet {
                user_id,
                balance_avail: row.get("balance_avail"),
                balance_frozen: row.get("balance_frozen"),
            });
        }

        // First engagement for this user: create the row under the
        // same lock so a concurrent creator can't race us.
        sqlx::query(
            "INSERT INTO wallets_tb (user_id, balance_avail, balance_frozen) VALUES ($1, 0, 0)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id as i64)
        .execute(&mut *self.tx_mut())
        .await?;

        Ok(Wallet {
            user_id,
            balance_avail: 0,
            balance_frozen: 0,
        })
    }

    async fn set_balances(
        &mut self,
        user_id: UserId,
        balance_avail: i64,
        balance_frozen: i64,
    ) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE wallets_tb SET balance_avail = $1, balance_frozen = $2 WHERE user_id = $3",
        )
        .bind(balance_avail)
        .bind(balance_frozen)
        .bind(user_id as i64)
        .execute(&mut *self.tx_mut())
        .await?;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), EngineError> {
        let tx = self.tx.take().expect("wallet tx used after commit/rollback");
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), EngineError> {
        let tx = self.tx.take().expect("wallet tx used after commit/rollback");
        tx.rollback().await?;
        Ok(())
    }
}
