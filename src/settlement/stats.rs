//! Player statistics upkeep.
//!
//! The leaderboard *surface* is out of scope; the table this upsert
//! maintains is not, since settlement explicitly mandates keeping it
//! current.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::core_types::{Stake, UserId};
use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStats {
    pub user_id: UserId,
    pub matches_played: u64,
    pub wins: u64,
    pub losses: u64,
    pub current_streak: i64,
    pub best_streak: i64,
    pub biggest_win_vp: u64,
    pub total_staked: u64,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait StatsRepo: Send + Sync {
    /// Apply the outcome of one settled match for `user_id`.
    async fn upsert_result(
        &self,
        user_id: UserId,
        stake: Stake,
        won: bool,
        payout_if_won: u64,
    ) -> Result<(), EngineError>;
}

pub struct PgStatsRepo {
    pool: PgPool,
}

impl PgStatsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsRepo for PgStatsRepo {
    async fn upsert_result(
        &self,
        user_id: UserId,
        stake: Stake,
        won: bool,
        payout_if_won: u64,
    ) -> Result<(), EngineError> {
        let row = sqlx::query(
            "SELECT matches_played, wins, losses, current_streak, best_streak, biggest_win_vp, total_staked
             FROM player_stats_tb WHERE user_id = $1",
        )
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        let (matches_played, wins, losses, mut current_streak, mut best_streak, mut biggest_win_vp, total_staked) =
            match row {
                Some(r) => (
                    r.get::<i64, _>("matches_played"),
                    r.get::<i64, _>("wins"),
                    r.get::<i64, _>("losses"),
                    r.get::<i64, _>("current_streak"),
                    r.get::<i64, _>("best_streak"),
                    r.get::<i64, _>("biggest_win_vp"),
                    r.get::<i64, _>("total_staked"),
                ),
                None => (0, 0, 0, 0, 0, 0, 0),
            };

        let (matches_played, wins, losses) = (matches_played + 1, wins + won as i64, losses + (!won) as i64);
        if won {
            current_streak = (current_streak + 1).max(1);
            best_streak = best_streak.max(current_streak);
            biggest_win_vp = biggest_win_vp.max(payout_if_won as i64);
        } else {
            current_streak = 0;
        }
        let total_staked = total_staked + stake as i64;

        sqlx::query(
            "INSERT INTO player_stats_tb
                (user_id, matches_played, wins, losses, current_streak, best_streak, biggest_win_vp, total_staked, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
             ON CONFLICT (user_id) DO UPDATE SET
                matches_played = EXCLUDED.matches_played,
                wins = EXCLUDED.wins,
                losses = EXCLUDED.losses,
                current_streak = EXCLUDED.current_streak,
                best_streak = EXCLUDED.best_streak,
                biggest_win_vp = EXCLUDED.biggest_win_vp,
                total_staked = EXCLUDED.total_staked,
                updated_at = now()",
        )
        .bind(user_id as i64)
        .bind(matches_played)
        .bind(wins)
        .bind(losses)
        .bind(current_streak)
        .bind(best_streak)
        .bind(biggest_win_vp)
        .bind(total_staked)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory double used by engine tests.
#[derive(Default)]
pub struct InMemoryStatsRepo {
    rows: Mutex<HashMap<UserId, PlayerStats>>,
}

impl InMemoryStatsRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: UserId) -> Option<PlayerStats> {
        self.rows.lock().unwrap().get(&user_id).cloned()
    }
}

#[async_trait]
impl StatsRepo for InMemoryStatsRepo {
    async fn upsert_result(
        &self,
        user_id: UserId,
        stake: Stake,
        won: bool,
        payout_if_won: u64,
    ) -> Result<(), EngineError> {
        let mut rows = self.rows.lock().unwrap();
        let entry = rows.entry(user_id).or_insert_with(|| PlayerStats {
            user_id,
            matches_played: 0,
            wins: 0,
            losses: 0,
            current_streak: 0,
            best_streak: 0,
            biggest_win_vp: 0,
            total_staked: 0,
            updated_at: Utc::now(),
        });
        entry.matches_played += 1;
        if won {
            entry.wins += 1;
            entry.current_streak = (entry.current_streak + 1).max(1);
            entry.best_streak = entry.best_streak.max(entry.current_streak);
            entry.biggest_win_vp = entry.biggest_win_vp.max(payout_if_won);
        } else {
            entry.losses += 1;
            entry.current_streak = 0;
        }
        entry.total_staked += stake;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streak_resets_on_loss() {
        let repo = InMemoryStatsRepo::new();
        repo.upsert_result(1, 100, true, 190).await.unwrap();
        repo.upsert_result(1, 100, true, 190).await.unwrap();
        repo.upsert_result(1, 100, false, 0).await.unwrap();

        let stats = repo.get(1).unwrap();
        assert_eq!(stats.matches_played, 3);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.best_streak, 2);
        assert_eq!(stats.biggest_win_vp, 190);
    }
}
