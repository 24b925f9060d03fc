//! Storage and notification boundaries consumed by the engine.
//!
//! Implementations are injected into [`MatchingEngine`](crate::matching::MatchingEngine)
//! and [`AwardCoordinator`](crate::coordinator::AwardCoordinator); the
//! PostgreSQL versions live in the db crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::achievement::{
    Achievement, HistoryScope, NewAward, NewUnlock, NoticeKind, RuleKind, RuleTree,
};
use crate::error::RepoError;
use crate::types::DbId;

/// Loads the rule structure relevant to a trigger.
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Every achievement with at least one ruleset containing a rule of
    /// criteria type `trigger`, with all rules of those rulesets (including
    /// rules of other criteria types).
    async fn rules_for_trigger(&self, kind: RuleKind, trigger: &str)
        -> Result<RuleTree, RepoError>;
}

/// Looks up achievement definitions.
#[async_trait]
pub trait AchievementSource: Send + Sync {
    async fn get(&self, achievement_id: DbId) -> Result<Option<Achievement>, RepoError>;
}

/// Reads and appends award/unlock records.
///
/// The `record_*` methods return whether a row was written. Implementations
/// must make the existence check and the insert atomic so concurrent
/// writers cannot double-award a non-repeatable achievement.
#[async_trait]
pub trait AwardHistory: Send + Sync {
    async fn count_awards(&self, scope: HistoryScope) -> Result<i64, RepoError>;

    async fn record_award(&self, award: &NewAward, allow_multiple: bool)
        -> Result<bool, RepoError>;

    async fn count_unlocks(&self, scope: HistoryScope) -> Result<i64, RepoError>;

    async fn record_unlock(&self, unlock: &NewUnlock) -> Result<bool, RepoError>;
}

/// An award or unlock announcement for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementNotice {
    pub account_id: DbId,
    pub character_id: DbId,
    pub achievement_id: DbId,
    pub kind: NoticeKind,
}

/// Fire-and-forget delivery of award/unlock notices.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: AchievementNotice);
}
