//! Repository for the `achievement_unlocks` table.

use accolade_core::achievement::{AchievementType, HistoryScope, NewUnlock};
use sqlx::PgPool;

/// Provides operations on unlock history.
pub struct UnlockRepo;

impl UnlockRepo {
    /// Count unlocks within `scope`. A `None` character counts every
    /// character of the account.
    pub async fn count(pool: &PgPool, scope: HistoryScope) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM achievement_unlocks \
             WHERE achievement_id = $1 AND account_id = $2 \
               AND ($3::BIGINT IS NULL OR character_id = $3)",
        )
        .bind(scope.achievement_id)
        .bind(scope.account_id)
        .bind(scope.character_id)
        .fetch_one(pool)
        .await?;
        Ok(count.unwrap_or(0))
    }

    /// Insert an unlock unless one already exists for the candidate.
    ///
    /// Account-scoped achievements treat any character of the account as
    /// already unlocked. Returns `true` if a row was inserted.
    pub async fn record(pool: &PgPool, unlock: &NewUnlock) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query(
            "SELECT pg_advisory_xact_lock(hashtextextended(format('unlock:%s:%s', $1::BIGINT, $2::BIGINT), 0))",
        )
        .bind(unlock.achievement_id)
        .bind(unlock.account_id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "INSERT INTO achievement_unlocks \
                 (achievement_id, account_id, character_id, unlock_time) \
             SELECT $1, $2, $3, $4 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM achievement_unlocks \
                 WHERE achievement_id = $1 AND account_id = $2 \
                   AND ($5 OR character_id = $3) \
             ) \
             ON CONFLICT ON CONSTRAINT uq_achievement_unlocks DO NOTHING",
        )
        .bind(unlock.achievement_id)
        .bind(unlock.account_id)
        .bind(unlock.character_id)
        .bind(unlock.unlock_time)
        .bind(unlock.achievement_type == AchievementType::Account)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
