//! Repository for the `achievement_awards` table.

use accolade_core::achievement::{AchievementType, HistoryScope, NewAward};
use accolade_core::types::{CandidateKey, DbId};
use futures::stream::{BoxStream, StreamExt};
use sqlx::PgPool;

use crate::models::award::AchievementAward;

/// Column list for achievement_awards queries.
const COLUMNS: &str =
    "id, achievement_id, account_id, character_id, awarded_time, awarded_by";

/// Candidates grouped per character by award count.
const CHARACTER_HOLDERS_QUERY: &str = "SELECT aw.account_id, aw.character_id \
     FROM achievement_awards aw \
     JOIN achievements a ON a.id = aw.achievement_id \
     WHERE ($2::TEXT IS NULL OR a.achievement_type = $2) \
       AND ($3::BIGINT IS NULL OR aw.achievement_id = $3) \
       AND ($4::BIGINT IS NULL OR aw.account_id = $4) \
       AND ($5::BIGINT IS NULL OR aw.character_id = $5) \
     GROUP BY aw.account_id, aw.character_id \
     HAVING COUNT(*) >= $1";

/// Candidates grouped per account by award count. Awards on every character
/// of the account count; the candidate carries the requested character, or
/// the account's lowest character id when none was requested.
const ACCOUNT_HOLDERS_QUERY: &str = "SELECT aw.account_id, \
            COALESCE($5::BIGINT, MIN(aw.character_id)) AS character_id \
     FROM achievement_awards aw \
     JOIN achievements a ON a.id = aw.achievement_id \
     WHERE ($2::TEXT IS NULL OR a.achievement_type = $2) \
       AND ($3::BIGINT IS NULL OR aw.achievement_id = $3) \
       AND ($4::BIGINT IS NULL OR aw.account_id = $4) \
     GROUP BY aw.account_id \
     HAVING COUNT(*) >= $1";

/// Which award holders to select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolderFilter {
    /// Minimum number of matching awards a candidate must hold.
    pub min_awards: i64,
    /// Only count awards of achievements of this type.
    pub achievement_type: Option<AchievementType>,
    /// Only count awards of this achievement.
    pub achievement_id: Option<DbId>,
    pub account_id: Option<DbId>,
    pub character_id: Option<DbId>,
}

impl HolderFilter {
    /// Account-type awards are held by the account as a whole, so they are
    /// counted across characters.
    fn query(&self) -> &'static str {
        match self.achievement_type {
            Some(AchievementType::Account) => ACCOUNT_HOLDERS_QUERY,
            _ => CHARACTER_HOLDERS_QUERY,
        }
    }
}

/// Provides operations on award history.
pub struct AwardRepo;

impl AwardRepo {
    /// Count awards within `scope`. A `None` character counts every
    /// character of the account.
    pub async fn count(pool: &PgPool, scope: HistoryScope) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM achievement_awards \
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

    /// Insert an award unless a non-repeatable award already exists.
    ///
    /// Takes a transaction-scoped advisory lock on (achievement, account) so
    /// the existence check and insert cannot interleave with a concurrent
    /// writer. Returns `true` if a row was inserted.
    pub async fn record(
        pool: &PgPool,
        award: &NewAward,
        allow_multiple: bool,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query(
            "SELECT pg_advisory_xact_lock(hashtextextended(format('award:%s:%s', $1::BIGINT, $2::BIGINT), 0))",
        )
        .bind(award.achievement_id)
        .bind(award.account_id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "INSERT INTO achievement_awards \
                 (achievement_id, account_id, character_id, awarded_time, awarded_by) \
             SELECT $1, $2, $3, $4, $5 \
             WHERE $6 OR NOT EXISTS ( \
                 SELECT 1 FROM achievement_awards \
                 WHERE achievement_id = $1 AND account_id = $2 \
                   AND ($7 OR character_id = $3) \
             )",
        )
        .bind(award.achievement_id)
        .bind(award.account_id)
        .bind(award.character_id)
        .bind(award.awarded_time)
        .bind(award.awarded_by)
        .bind(allow_multiple)
        .bind(award.achievement_type == AchievementType::Account)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// List awards held by an account, newest first.
    pub async fn list_for_account(
        pool: &PgPool,
        account_id: DbId,
    ) -> Result<Vec<AchievementAward>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM achievement_awards \
             WHERE account_id = $1 \
             ORDER BY awarded_time DESC, id DESC"
        );
        sqlx::query_as::<_, AchievementAward>(&query)
            .bind(account_id)
            .fetch_all(pool)
            .await
    }

    /// Candidates matching `filter`.
    pub async fn holders(
        pool: &PgPool,
        filter: &HolderFilter,
    ) -> Result<Vec<CandidateKey>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (DbId, DbId)>(filter.query())
            .bind(filter.min_awards)
            .bind(filter.achievement_type.map(|t| t.as_str()))
            .bind(filter.achievement_id)
            .bind(filter.account_id)
            .bind(filter.character_id)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(CandidateKey::from).collect())
    }

    /// Candidates matching `filter`, streamed from the database cursor.
    pub fn stream_holders(
        pool: &PgPool,
        filter: HolderFilter,
    ) -> BoxStream<'_, Result<CandidateKey, sqlx::Error>> {
        sqlx::query_as::<_, (DbId, DbId)>(filter.query())
            .bind(filter.min_awards)
            .bind(filter.achievement_type.map(|t| t.as_str()))
            .bind(filter.achievement_id)
            .bind(filter.account_id)
            .bind(filter.character_id)
            .fetch(pool)
            .map(|row| row.map(CandidateKey::from))
            .boxed()
    }
}
