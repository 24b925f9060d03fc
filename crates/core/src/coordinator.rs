//! Award/unlock coordination.
//!
//! Turns matches from the [`MatchingEngine`] into award and unlock records,
//! announces them through the [`NotificationSink`], and re-evaluates the
//! meta-triggers so "earn N achievements" style achievements can follow.
//! Meta re-evaluation nests at most `max_meta_depth` levels below the
//! original trigger.

use std::sync::Arc;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use futures::StreamExt;
use serde::Serialize;

use crate::achievement::{
    Achievement, AchievementMatch, HistoryScope, NewAward, NewUnlock, RuleKind, META_TRIGGERS,
};
use crate::config::{EngineConfig, DEFAULT_MAX_META_DEPTH};
use crate::error::{CoreError, EngineError};
use crate::matching::MatchingEngine;
use crate::ports::{AchievementNotice, AchievementSource, AwardHistory, NotificationSink};
use crate::types::DbId;

/// Which provider evaluation a pass uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Current,
    Retroactive,
}

/// Everything written by one trigger pass, including nested meta passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriggerOutcome {
    pub awarded: Vec<AchievementMatch>,
    pub unlocked: Vec<AchievementMatch>,
}

impl TriggerOutcome {
    pub fn is_empty(&self) -> bool {
        self.awarded.is_empty() && self.unlocked.is_empty()
    }

    fn absorb(&mut self, other: TriggerOutcome) {
        self.awarded.extend(other.awarded);
        self.unlocked.extend(other.unlocked);
    }
}

/// Applies matching results to award/unlock history.
pub struct AwardCoordinator {
    engine: MatchingEngine,
    achievements: Arc<dyn AchievementSource>,
    history: Arc<dyn AwardHistory>,
    notifier: Arc<dyn NotificationSink>,
    max_meta_depth: u32,
}

impl AwardCoordinator {
    pub fn new(
        engine: MatchingEngine,
        achievements: Arc<dyn AchievementSource>,
        history: Arc<dyn AwardHistory>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            engine,
            achievements,
            history,
            notifier,
            max_meta_depth: DEFAULT_MAX_META_DEPTH,
        }
    }

    pub fn with_max_meta_depth(mut self, max_meta_depth: u32) -> Self {
        self.max_meta_depth = max_meta_depth;
        self
    }

    /// Apply the tunables from `config` to the coordinator and its engine.
    pub fn configured(self, config: &EngineConfig) -> Self {
        let Self {
            engine,
            achievements,
            history,
            notifier,
            ..
        } = self;
        Self {
            engine: engine.with_pruning(config.pruning),
            achievements,
            history,
            notifier,
            max_meta_depth: config.max_meta_depth,
        }
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    /// Handle an event that just happened.
    pub async fn on_trigger(
        &self,
        trigger: &str,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> Result<TriggerOutcome, EngineError> {
        self.process(Mode::Current, trigger, account_id, character_id, 0)
            .await
    }

    /// Backfill `trigger` against full history.
    pub async fn on_retroactive(
        &self,
        trigger: &str,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> Result<TriggerOutcome, EngineError> {
        self.process(Mode::Retroactive, trigger, account_id, character_id, 0)
            .await
    }

    /// Boxed so meta-trigger passes can recurse.
    fn process<'a>(
        &'a self,
        mode: Mode,
        trigger: &'a str,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
        depth: u32,
    ) -> BoxFuture<'a, Result<TriggerOutcome, EngineError>> {
        async move {
            let mut outcome = TriggerOutcome::default();
            for kind in [RuleKind::Award, RuleKind::Unlock] {
                match mode {
                    Mode::Current => {
                        let matches = self
                            .engine
                            .match_current(kind, trigger, account_id, character_id)
                            .await?;
                        for m in matches {
                            self.apply(kind, mode, m, depth, &mut outcome).await?;
                        }
                    }
                    Mode::Retroactive => {
                        let mut matches = self
                            .engine
                            .match_retroactive(kind, trigger, account_id, character_id)
                            .await?;
                        while let Some(m) = matches.next().await {
                            self.apply(kind, mode, m, depth, &mut outcome).await?;
                        }
                    }
                }
            }
            Ok(outcome)
        }
        .boxed()
    }

    async fn apply(
        &self,
        kind: RuleKind,
        mode: Mode,
        m: AchievementMatch,
        depth: u32,
        outcome: &mut TriggerOutcome,
    ) -> Result<(), EngineError> {
        let achievement = self.achievement(m.achievement_id).await?;
        let written = match kind {
            RuleKind::Award => self.try_award(&achievement, &m).await?,
            RuleKind::Unlock => self.try_unlock(&achievement, &m).await?,
        };
        if !written {
            return Ok(());
        }

        tracing::info!(
            achievement_id = m.achievement_id,
            account_id = m.account_id,
            character_id = m.character_id,
            kind = kind.as_str(),
            depth,
            "Achievement recorded",
        );
        match kind {
            RuleKind::Award => outcome.awarded.push(m),
            RuleKind::Unlock => outcome.unlocked.push(m),
        }
        self.notifier.notify(AchievementNotice {
            account_id: m.account_id,
            character_id: m.character_id,
            achievement_id: m.achievement_id,
            kind: kind.into(),
        });

        let nested = self.fire_meta(mode, &m, depth).await?;
        outcome.absorb(nested);
        Ok(())
    }

    async fn fire_meta(
        &self,
        mode: Mode,
        m: &AchievementMatch,
        depth: u32,
    ) -> Result<TriggerOutcome, EngineError> {
        let mut outcome = TriggerOutcome::default();
        if depth >= self.max_meta_depth {
            tracing::debug!(
                achievement_id = m.achievement_id,
                depth,
                max_meta_depth = self.max_meta_depth,
                "Meta-trigger depth limit reached",
            );
            return Ok(outcome);
        }
        for trigger in META_TRIGGERS {
            let nested = self
                .process(
                    mode,
                    trigger,
                    Some(m.account_id),
                    Some(m.character_id),
                    depth + 1,
                )
                .await?;
            outcome.absorb(nested);
        }
        Ok(outcome)
    }

    async fn achievement(&self, achievement_id: DbId) -> Result<Achievement, EngineError> {
        self.achievements
            .get(achievement_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "achievement",
                    id: achievement_id,
                }
                .into()
            })
    }

    async fn try_award(
        &self,
        achievement: &Achievement,
        m: &AchievementMatch,
    ) -> Result<bool, EngineError> {
        let times_awarded = self
            .history
            .count_awards(HistoryScope::for_match(achievement, m))
            .await?;
        if times_awarded > 0 && !achievement.can_receive_multiple {
            tracing::debug!(
                achievement_id = m.achievement_id,
                account_id = m.account_id,
                character_id = m.character_id,
                "Already awarded and not repeatable",
            );
            return Ok(false);
        }

        let award = NewAward {
            achievement_id: m.achievement_id,
            achievement_type: achievement.achievement_type,
            account_id: m.account_id,
            character_id: m.character_id,
            awarded_time: Utc::now(),
            awarded_by: None,
        };
        let written = self
            .history
            .record_award(&award, achievement.can_receive_multiple)
            .await?;
        if !written {
            tracing::debug!(
                achievement_id = m.achievement_id,
                account_id = m.account_id,
                "Award recorded concurrently, skipping",
            );
        }
        Ok(written)
    }

    async fn try_unlock(
        &self,
        achievement: &Achievement,
        m: &AchievementMatch,
    ) -> Result<bool, EngineError> {
        let unlocked = self
            .history
            .count_unlocks(HistoryScope::for_match(achievement, m))
            .await?;
        if unlocked > 0 {
            return Ok(false);
        }

        let unlock = NewUnlock {
            achievement_id: m.achievement_id,
            achievement_type: achievement.achievement_type,
            account_id: m.account_id,
            character_id: m.character_id,
            unlock_time: Utc::now(),
        };
        Ok(self.history.record_unlock(&unlock).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
