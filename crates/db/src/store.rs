//! PostgreSQL implementation of the engine's storage ports.

use accolade_core::achievement::{
    Achievement, HistoryScope, NewAward, NewUnlock, RuleKind, RuleTree,
};
use accolade_core::error::RepoError;
use accolade_core::ports::{AchievementSource, AwardHistory, RuleSource};
use accolade_core::types::DbId;
use async_trait::async_trait;

use crate::models::rule::into_rule_tree;
use crate::repositories::{AchievementRepo, AchievementRuleRepo, AwardRepo, UnlockRepo};
use crate::DbPool;

/// Map a driver error into the port error type.
pub(crate) fn repo_err(e: sqlx::Error) -> RepoError {
    RepoError::Database(e.to_string())
}

/// Pool-owning adapter that serves every storage port from one database.
#[derive(Clone)]
pub struct PgAchievementStore {
    pool: DbPool,
}

impl PgAchievementStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl RuleSource for PgAchievementStore {
    async fn rules_for_trigger(
        &self,
        kind: RuleKind,
        trigger: &str,
    ) -> Result<RuleTree, RepoError> {
        let rows = AchievementRuleRepo::list_for_trigger(&self.pool, kind, trigger)
            .await
            .map_err(repo_err)?;
        tracing::debug!(
            trigger,
            kind = kind.as_str(),
            rules = rows.len(),
            "Loaded rules for trigger",
        );
        Ok(into_rule_tree(rows))
    }
}

#[async_trait]
impl AchievementSource for PgAchievementStore {
    async fn get(&self, achievement_id: DbId) -> Result<Option<Achievement>, RepoError> {
        AchievementRepo::find_by_id(&self.pool, achievement_id)
            .await
            .map_err(repo_err)?
            .map(Achievement::try_from)
            .transpose()
    }
}

#[async_trait]
impl AwardHistory for PgAchievementStore {
    async fn count_awards(&self, scope: HistoryScope) -> Result<i64, RepoError> {
        AwardRepo::count(&self.pool, scope).await.map_err(repo_err)
    }

    async fn record_award(
        &self,
        award: &NewAward,
        allow_multiple: bool,
    ) -> Result<bool, RepoError> {
        AwardRepo::record(&self.pool, award, allow_multiple)
            .await
            .map_err(repo_err)
    }

    async fn count_unlocks(&self, scope: HistoryScope) -> Result<i64, RepoError> {
        UnlockRepo::count(&self.pool, scope).await.map_err(repo_err)
    }

    async fn record_unlock(&self, unlock: &NewUnlock) -> Result<bool, RepoError> {
        UnlockRepo::record(&self.pool, unlock).await.map_err(repo_err)
    }
}
