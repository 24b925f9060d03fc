//! Built-in criteria providers backed by award history.
//!
//! The coordinator re-fires the meta triggers after every award, so these
//! providers ship with the store. Register them with [`builtin_catalog`].

use std::sync::Arc;

use accolade_core::achievement::{
    AchievementType, TRIGGER_ACCOUNT_META, TRIGGER_CHARACTER_META, TRIGGER_META,
};
use accolade_core::criteria::{
    parse_params, CriteriaProvider, CriteriaScope, ProviderError, StaticCatalog,
};
use accolade_core::types::{CandidateKey, DbId};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::repositories::{AchievementRepo, AwardRepo, HolderFilter};

/// Criteria type of [`HasAchievementProvider`].
pub const CRITERIA_HAS_ACHIEVEMENT: &str = "HasAchievement";

#[derive(Debug, Deserialize)]
struct CountParams {
    count: i64,
}

#[derive(Debug, Deserialize)]
struct HasAchievementParams {
    achievement_id: DbId,
}

fn query_err(e: sqlx::Error) -> ProviderError {
    ProviderError::Query(e.to_string())
}

/// Stream a parameter error as the only item.
fn failed<'a>(e: ProviderError) -> BoxStream<'a, Result<CandidateKey, ProviderError>> {
    stream::once(async move { Err(e) }).boxed()
}

// ---------------------------------------------------------------------------
// Award counts
// ---------------------------------------------------------------------------

/// Candidates holding at least `count` awards, optionally restricted to one
/// achievement type.
pub struct AwardCountProvider {
    pool: PgPool,
    name: &'static str,
    scope: CriteriaScope,
    achievement_type: Option<AchievementType>,
}

impl AwardCountProvider {
    /// `MetaAchievement`: awards of any type.
    pub fn meta(pool: PgPool) -> Self {
        Self {
            pool,
            name: TRIGGER_META,
            scope: CriteriaScope::Character,
            achievement_type: None,
        }
    }

    /// `AccountMetaAchievement`: awards of account-type achievements, counted
    /// across every character of the account.
    pub fn account_meta(pool: PgPool) -> Self {
        Self {
            pool,
            name: TRIGGER_ACCOUNT_META,
            scope: CriteriaScope::Account,
            achievement_type: Some(AchievementType::Account),
        }
    }

    /// `CharacterMetaAchievement`: awards of character-type achievements.
    pub fn character_meta(pool: PgPool) -> Self {
        Self {
            pool,
            name: TRIGGER_CHARACTER_META,
            scope: CriteriaScope::Character,
            achievement_type: Some(AchievementType::Character),
        }
    }

    fn filter(
        &self,
        params: &Value,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> Result<HolderFilter, ProviderError> {
        let params: CountParams = parse_params(self.name, params)?;
        if params.count < 1 {
            return Err(ProviderError::InvalidParams {
                criteria_type: self.name,
                message: format!("count must be at least 1, got {}", params.count),
            });
        }
        Ok(HolderFilter {
            min_awards: params.count,
            achievement_type: self.achievement_type,
            achievement_id: None,
            account_id,
            character_id,
        })
    }
}

#[async_trait]
impl CriteriaProvider for AwardCountProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn scope(&self) -> CriteriaScope {
        self.scope
    }

    async fn current_members(
        &self,
        params: &Value,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> Result<Vec<CandidateKey>, ProviderError> {
        let filter = self.filter(params, account_id, character_id)?;
        AwardRepo::holders(&self.pool, &filter)
            .await
            .map_err(query_err)
    }

    fn retroactive_members<'a>(
        &'a self,
        params: &'a Value,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> BoxStream<'a, Result<CandidateKey, ProviderError>> {
        match self.filter(params, account_id, character_id) {
            Ok(filter) => AwardRepo::stream_holders(&self.pool, filter)
                .map(|row| row.map_err(query_err))
                .boxed(),
            Err(e) => failed(e),
        }
    }
}

// ---------------------------------------------------------------------------
// HasAchievement
// ---------------------------------------------------------------------------

/// Candidates holding at least one award of a given achievement.
pub struct HasAchievementProvider {
    pool: PgPool,
}

impl HasAchievementProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Awards of an account-type achievement count for every character of
    /// the holding account, so the achievement's type picks the grouping.
    async fn filter(
        &self,
        params: &Value,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> Result<HolderFilter, ProviderError> {
        let params: HasAchievementParams = parse_params(CRITERIA_HAS_ACHIEVEMENT, params)?;
        let achievement_type = match AchievementRepo::find_by_id(&self.pool, params.achievement_id)
            .await
            .map_err(query_err)?
        {
            Some(row) => Some(
                AchievementType::from_str_value(&row.achievement_type)
                    .map_err(|e| ProviderError::Query(e.to_string()))?,
            ),
            None => None,
        };
        Ok(HolderFilter {
            min_awards: 1,
            achievement_type,
            achievement_id: Some(params.achievement_id),
            account_id,
            character_id,
        })
    }
}

#[async_trait]
impl CriteriaProvider for HasAchievementProvider {
    fn name(&self) -> &'static str {
        CRITERIA_HAS_ACHIEVEMENT
    }

    fn scope(&self) -> CriteriaScope {
        CriteriaScope::Character
    }

    async fn current_members(
        &self,
        params: &Value,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> Result<Vec<CandidateKey>, ProviderError> {
        let filter = self.filter(params, account_id, character_id).await?;
        AwardRepo::holders(&self.pool, &filter)
            .await
            .map_err(query_err)
    }

    fn retroactive_members<'a>(
        &'a self,
        params: &'a Value,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> BoxStream<'a, Result<CandidateKey, ProviderError>> {
        stream::once(self.filter(params, account_id, character_id))
            .map_ok(move |filter| AwardRepo::stream_holders(&self.pool, filter).map_err(query_err))
            .try_flatten()
            .boxed()
    }
}

/// Catalog holding every built-in provider, sharing `pool`.
pub fn builtin_catalog(pool: &PgPool) -> StaticCatalog {
    StaticCatalog::new()
        .register_instance(Arc::new(AwardCountProvider::meta(pool.clone())))
        .register_instance(Arc::new(AwardCountProvider::account_meta(pool.clone())))
        .register_instance(Arc::new(AwardCountProvider::character_meta(pool.clone())))
        .register_instance(Arc::new(HasAchievementProvider::new(pool.clone())))
}
