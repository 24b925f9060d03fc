//! Retroactive backfill of achievement triggers.
//!
//! [`BackfillJob`] re-evaluates each configured trigger against full
//! history through the award coordinator, one trigger at a time.

use std::sync::Arc;

use accolade_core::AwardCoordinator;
use serde::Serialize;

/// Parse a comma-separated trigger list, dropping blanks and duplicates
/// while keeping first-seen order.
pub fn parse_triggers(raw: &str) -> Vec<String> {
    let mut triggers: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !triggers.iter().any(|t| t == name) {
            triggers.push(name.to_string());
        }
    }
    triggers
}

/// Result of backfilling one trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerReport {
    pub trigger: String,
    pub awarded: usize,
    pub unlocked: usize,
    /// Error message when the pass failed.
    pub error: Option<String>,
}

/// Per-trigger results of a backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub triggers: Vec<TriggerReport>,
}

impl BackfillReport {
    pub fn total_awarded(&self) -> usize {
        self.triggers.iter().map(|t| t.awarded).sum()
    }

    pub fn total_unlocked(&self) -> usize {
        self.triggers.iter().map(|t| t.unlocked).sum()
    }

    pub fn failed(&self) -> usize {
        self.triggers.iter().filter(|t| t.error.is_some()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// Runs retroactive passes over a list of triggers.
pub struct BackfillJob {
    coordinator: Arc<AwardCoordinator>,
    triggers: Vec<String>,
}

impl BackfillJob {
    pub fn new(coordinator: Arc<AwardCoordinator>, triggers: Vec<String>) -> Self {
        Self {
            coordinator,
            triggers,
        }
    }

    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    /// Backfill every trigger in order. A failing trigger is recorded and
    /// the run moves on to the next one.
    pub async fn run(&self) -> BackfillReport {
        let mut report = BackfillReport::default();
        for trigger in &self.triggers {
            if !self.coordinator.engine().registry().is_known(trigger) {
                tracing::warn!(trigger = %trigger, "No criteria provider registered for trigger");
            }

            tracing::info!(trigger = %trigger, "Backfilling trigger");
            let entry = match self.coordinator.on_retroactive(trigger, None, None).await {
                Ok(outcome) => {
                    tracing::info!(
                        trigger = %trigger,
                        awarded = outcome.awarded.len(),
                        unlocked = outcome.unlocked.len(),
                        "Backfill complete",
                    );
                    TriggerReport {
                        trigger: trigger.clone(),
                        awarded: outcome.awarded.len(),
                        unlocked: outcome.unlocked.len(),
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, trigger = %trigger, "Backfill failed");
                    TriggerReport {
                        trigger: trigger.clone(),
                        awarded: 0,
                        unlocked: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            report.triggers.push(entry);
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use accolade_core::achievement::{
        Achievement, AchievementType, HistoryScope, NewAward, NewUnlock, Rule, RuleKind, RuleTree,
    };
    use accolade_core::criteria::{
        CriteriaProvider, CriteriaRegistry, CriteriaScope, ProviderError, StaticCatalog,
    };
    use accolade_core::error::RepoError;
    use accolade_core::ports::{
        AchievementNotice, AchievementSource, AwardHistory, NotificationSink, RuleSource,
    };
    use accolade_core::types::{CandidateKey, DbId};
    use accolade_core::MatchingEngine;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;

    // -- parse_triggers --

    #[test]
    fn parse_trims_and_dedupes() {
        assert_eq!(
            parse_triggers(" PostCount, Level,,PostCount ,"),
            vec!["PostCount".to_string(), "Level".to_string()]
        );
    }

    #[test]
    fn parse_empty_is_empty() {
        assert!(parse_triggers("").is_empty());
        assert!(parse_triggers(" , ").is_empty());
    }

    // -- BackfillJob --

    struct Members(&'static str, Vec<CandidateKey>);

    #[async_trait]
    impl CriteriaProvider for Members {
        fn name(&self) -> &'static str {
            self.0
        }

        fn scope(&self) -> CriteriaScope {
            CriteriaScope::Character
        }

        async fn current_members(
            &self,
            _params: &Value,
            _account_id: Option<DbId>,
            _character_id: Option<DbId>,
        ) -> Result<Vec<CandidateKey>, ProviderError> {
            Ok(self.1.clone())
        }
    }

    /// Achievement 1 is awarded by `PostCount`; `Orphan` awards achievement
    /// 99, which has no definition.
    #[derive(Default)]
    struct Store {
        awards: Mutex<Vec<NewAward>>,
    }

    #[async_trait]
    impl RuleSource for Store {
        async fn rules_for_trigger(
            &self,
            kind: RuleKind,
            trigger: &str,
        ) -> Result<RuleTree, RepoError> {
            let mut tree = RuleTree::new();
            if kind == RuleKind::Award {
                let achievement = if trigger == "Orphan" { 99 } else { 1 };
                tree.entry(achievement)
                    .or_default()
                    .insert(1, vec![Rule::new(trigger, json!({}))]);
            }
            Ok(tree)
        }
    }

    #[async_trait]
    impl AchievementSource for Store {
        async fn get(&self, achievement_id: DbId) -> Result<Option<Achievement>, RepoError> {
            Ok((achievement_id == 1).then(|| Achievement {
                id: 1,
                name: "Writer".into(),
                description: None,
                achievement_type: AchievementType::Character,
                can_receive_multiple: false,
            }))
        }
    }

    #[async_trait]
    impl AwardHistory for Store {
        async fn count_awards(&self, scope: HistoryScope) -> Result<i64, RepoError> {
            Ok(self
                .awards
                .lock()
                .unwrap()
                .iter()
                .filter(|a| {
                    a.achievement_id == scope.achievement_id
                        && a.account_id == scope.account_id
                        && scope.character_id.map_or(true, |c| c == a.character_id)
                })
                .count() as i64)
        }

        async fn record_award(
            &self,
            award: &NewAward,
            _allow_multiple: bool,
        ) -> Result<bool, RepoError> {
            self.awards.lock().unwrap().push(award.clone());
            Ok(true)
        }

        async fn count_unlocks(&self, _scope: HistoryScope) -> Result<i64, RepoError> {
            Ok(0)
        }

        async fn record_unlock(&self, _unlock: &NewUnlock) -> Result<bool, RepoError> {
            Ok(true)
        }
    }

    struct Silent;

    impl NotificationSink for Silent {
        fn notify(&self, _notice: AchievementNotice) {}
    }

    fn job(triggers: &[&str]) -> BackfillJob {
        let members = vec![CandidateKey::new(1, 10), CandidateKey::new(2, 20)];
        let catalog = StaticCatalog::new()
            .register_instance(Arc::new(Members("PostCount", members.clone())))
            .register_instance(Arc::new(Members("Orphan", members)));
        let registry = Arc::new(CriteriaRegistry::new(Arc::new(catalog)));
        let store = Arc::new(Store::default());
        let engine = MatchingEngine::new(registry, store.clone());
        let coordinator = AwardCoordinator::new(engine, store.clone(), store, Arc::new(Silent))
            .with_max_meta_depth(0);
        BackfillJob::new(
            Arc::new(coordinator),
            triggers.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn backfill_reports_awards_per_trigger() {
        let report = job(&["PostCount"]).run().await;

        assert_eq!(report.triggers.len(), 1);
        assert_eq!(report.triggers[0].awarded, 2);
        assert_eq!(report.total_awarded(), 2);
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn backfill_continues_past_failing_trigger() {
        let report = job(&["Orphan", "PostCount"]).run().await;

        assert_eq!(report.failed(), 1);
        assert!(report.triggers[0].error.is_some());
        assert_eq!(report.triggers[1].awarded, 2);
    }

    #[tokio::test]
    async fn second_backfill_writes_nothing() {
        let job = job(&["PostCount"]);
        assert_eq!(job.run().await.total_awarded(), 2);
        assert_eq!(job.run().await.total_awarded(), 0);
    }

    #[tokio::test]
    async fn unknown_trigger_is_not_a_failure() {
        let report = job(&["NobodyProvidesThis"]).run().await;
        assert!(!report.has_failures());
        assert_eq!(report.total_awarded(), 0);
    }
}
