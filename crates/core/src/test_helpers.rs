//! In-memory implementations of the engine's ports for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::achievement::{
    Achievement, AchievementType, HistoryScope, NewAward, NewUnlock, Rule, RuleKind, RuleTree,
};
use crate::criteria::{CriteriaProvider, CriteriaScope, ProviderError};
use crate::error::RepoError;
use crate::ports::{AchievementNotice, AchievementSource, AwardHistory, NotificationSink, RuleSource};
use crate::types::{CandidateKey, DbId};

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// A provider whose members are fixed at construction. Narrowing by
/// account/character filters the fixed list.
pub struct StaticProvider {
    name: &'static str,
    scope: CriteriaScope,
    members: Vec<CandidateKey>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl StaticProvider {
    pub fn new(name: &'static str, members: &[(DbId, DbId)]) -> Self {
        Self {
            name,
            scope: CriteriaScope::Account,
            members: members.iter().copied().map(CandidateKey::from).collect(),
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A provider that always errors.
    pub fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, &[])
        }
    }

    pub fn with_scope(mut self, scope: CriteriaScope) -> Self {
        self.scope = scope;
        self
    }

    /// Number of times the provider has been evaluated.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CriteriaProvider for StaticProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn scope(&self) -> CriteriaScope {
        self.scope
    }

    async fn current_members(
        &self,
        _params: &Value,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> Result<Vec<CandidateKey>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Query(format!("{} is unavailable", self.name)));
        }
        Ok(self
            .members
            .iter()
            .copied()
            .filter(|k| account_id.map_or(true, |a| k.account_id == a))
            .filter(|k| character_id.map_or(true, |c| k.character_id == c))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Award and unlock rule tables held in memory.
#[derive(Default)]
pub struct InMemoryRules {
    award: RuleTree,
    unlock: RuleTree,
    loads: Arc<AtomicUsize>,
}

impl InMemoryRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn award(mut self, achievement_id: DbId, ruleset_id: DbId, rules: Vec<Rule>) -> Self {
        self.award
            .entry(achievement_id)
            .or_default()
            .insert(ruleset_id, rules);
        self
    }

    pub fn unlock(mut self, achievement_id: DbId, ruleset_id: DbId, rules: Vec<Rule>) -> Self {
        self.unlock
            .entry(achievement_id)
            .or_default()
            .insert(ruleset_id, rules);
        self
    }

    /// Number of `rules_for_trigger` calls served.
    pub fn load_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

#[async_trait]
impl RuleSource for InMemoryRules {
    async fn rules_for_trigger(
        &self,
        kind: RuleKind,
        trigger: &str,
    ) -> Result<RuleTree, RepoError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let table = match kind {
            RuleKind::Award => &self.award,
            RuleKind::Unlock => &self.unlock,
        };
        let mut tree = RuleTree::new();
        for (&achievement_id, rulesets) in table {
            for (&ruleset_id, rules) in rulesets {
                if rules.iter().any(|r| r.criteria_type == trigger) {
                    tree.entry(achievement_id)
                        .or_default()
                        .insert(ruleset_id, rules.clone());
                }
            }
        }
        Ok(tree)
    }
}

// ---------------------------------------------------------------------------
// Achievements
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryAchievements {
    rows: Vec<Achievement>,
}

impl InMemoryAchievements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: DbId, achievement_type: AchievementType, multiple: bool) -> Self {
        self.rows.push(Achievement {
            id,
            name: format!("Achievement {id}"),
            description: None,
            achievement_type,
            can_receive_multiple: multiple,
        });
        self
    }
}

#[async_trait]
impl AchievementSource for InMemoryAchievements {
    async fn get(&self, achievement_id: DbId) -> Result<Option<Achievement>, RepoError> {
        Ok(self.rows.iter().find(|a| a.id == achievement_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Award/unlock records held in memory.
#[derive(Default)]
pub struct InMemoryHistory {
    awards: Mutex<Vec<NewAward>>,
    unlocks: Mutex<Vec<NewUnlock>>,
    refuse_writes: bool,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A history whose `record_*` calls fail.
    pub fn refusing_writes() -> Self {
        Self {
            refuse_writes: true,
            ..Self::default()
        }
    }

    /// Pre-seed an award record.
    pub fn seed_award(&self, achievement_id: DbId, account_id: DbId, character_id: DbId) {
        self.awards.lock().unwrap().push(NewAward {
            achievement_id,
            achievement_type: AchievementType::Character,
            account_id,
            character_id,
            awarded_time: chrono::Utc::now(),
            awarded_by: None,
        });
    }

    /// Pre-seed an unlock record.
    pub fn seed_unlock(&self, achievement_id: DbId, account_id: DbId, character_id: DbId) {
        self.unlocks.lock().unwrap().push(NewUnlock {
            achievement_id,
            achievement_type: AchievementType::Character,
            account_id,
            character_id,
            unlock_time: chrono::Utc::now(),
        });
    }

    pub fn award_count(&self) -> usize {
        self.awards.lock().unwrap().len()
    }

    pub fn unlock_count(&self) -> usize {
        self.unlocks.lock().unwrap().len()
    }

    /// Awards held by a candidate, across all achievements.
    pub fn awards_held_by(&self, candidate: CandidateKey) -> usize {
        self.awards
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.account_id == candidate.account_id && a.character_id == candidate.character_id)
            .count()
    }

    /// Every candidate holding at least one award.
    pub fn holders(&self) -> Vec<CandidateKey> {
        let mut holders: Vec<CandidateKey> = self
            .awards
            .lock()
            .unwrap()
            .iter()
            .map(|a| CandidateKey::new(a.account_id, a.character_id))
            .collect();
        holders.sort();
        holders.dedup();
        holders
    }

    fn refuse(&self) -> Result<(), RepoError> {
        if self.refuse_writes {
            Err(RepoError::Database("write refused".to_string()))
        } else {
            Ok(())
        }
    }
}

fn in_scope(
    scope: &HistoryScope,
    achievement_id: DbId,
    account_id: DbId,
    character_id: DbId,
) -> bool {
    scope.achievement_id == achievement_id
        && scope.account_id == account_id
        && scope.character_id.map_or(true, |c| c == character_id)
}

fn scope_of(
    achievement_id: DbId,
    achievement_type: AchievementType,
    account_id: DbId,
    character_id: DbId,
) -> HistoryScope {
    HistoryScope {
        achievement_id,
        account_id,
        character_id: match achievement_type {
            AchievementType::Account => None,
            AchievementType::Character => Some(character_id),
        },
    }
}

#[async_trait]
impl AwardHistory for InMemoryHistory {
    async fn count_awards(&self, scope: HistoryScope) -> Result<i64, RepoError> {
        let awards = self.awards.lock().unwrap();
        Ok(awards
            .iter()
            .filter(|a| in_scope(&scope, a.achievement_id, a.account_id, a.character_id))
            .count() as i64)
    }

    async fn record_award(
        &self,
        award: &NewAward,
        allow_multiple: bool,
    ) -> Result<bool, RepoError> {
        self.refuse()?;
        let mut awards = self.awards.lock().unwrap();
        let scope = scope_of(
            award.achievement_id,
            award.achievement_type,
            award.account_id,
            award.character_id,
        );
        let exists = awards
            .iter()
            .any(|a| in_scope(&scope, a.achievement_id, a.account_id, a.character_id));
        if exists && !allow_multiple {
            return Ok(false);
        }
        awards.push(award.clone());
        Ok(true)
    }

    async fn count_unlocks(&self, scope: HistoryScope) -> Result<i64, RepoError> {
        let unlocks = self.unlocks.lock().unwrap();
        Ok(unlocks
            .iter()
            .filter(|u| in_scope(&scope, u.achievement_id, u.account_id, u.character_id))
            .count() as i64)
    }

    async fn record_unlock(&self, unlock: &NewUnlock) -> Result<bool, RepoError> {
        self.refuse()?;
        let mut unlocks = self.unlocks.lock().unwrap();
        let scope = scope_of(
            unlock.achievement_id,
            unlock.achievement_type,
            unlock.account_id,
            unlock.character_id,
        );
        if unlocks
            .iter()
            .any(|u| in_scope(&scope, u.achievement_id, u.account_id, u.character_id))
        {
            return Ok(false);
        }
        unlocks.push(unlock.clone());
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<AchievementNotice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<AchievementNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notice: AchievementNotice) {
        self.notices.lock().unwrap().push(notice);
    }
}
