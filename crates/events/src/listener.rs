//! Background task running the award coordinator for trigger events.
//!
//! [`TriggerListener`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! so the action that fired a trigger never waits on achievement processing
//! and is never failed by it. Coordinator errors are logged and dropped.

use std::sync::Arc;

use accolade_core::types::DbId;
use accolade_core::AwardCoordinator;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::AchievementEvent;

/// Consumes [`AchievementEvent::Trigger`] events.
pub struct TriggerListener;

impl TriggerListener {
    /// Run the listener loop.
    ///
    /// Exits when the bus is closed or `cancel` is cancelled. Award and
    /// unlock events on the same bus are ignored.
    pub async fn run(
        coordinator: Arc<AwardCoordinator>,
        mut receiver: broadcast::Receiver<AchievementEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Trigger listener cancelled");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(AchievementEvent::Trigger {
                        name,
                        account_id,
                        character_id,
                        retroactive,
                    }) => {
                        Self::handle(&coordinator, &name, account_id, character_id, retroactive)
                            .await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            skipped = n,
                            "Trigger listener lagged, some triggers were not processed"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, trigger listener shutting down");
                        break;
                    }
                },
            }
        }
    }

    async fn handle(
        coordinator: &AwardCoordinator,
        trigger: &str,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
        retroactive: bool,
    ) {
        let result = if retroactive {
            coordinator
                .on_retroactive(trigger, account_id, character_id)
                .await
        } else {
            coordinator.on_trigger(trigger, account_id, character_id).await
        };

        match result {
            Ok(outcome) if !outcome.is_empty() => {
                tracing::info!(
                    trigger,
                    awarded = outcome.awarded.len(),
                    unlocked = outcome.unlocked.len(),
                    "Trigger processed",
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    trigger,
                    account_id,
                    character_id,
                    "Failed to process achievement trigger"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use accolade_core::achievement::{
        Achievement, AchievementType, HistoryScope, NewAward, NewUnlock, Rule, RuleKind, RuleTree,
    };
    use accolade_core::criteria::{
        CriteriaProvider, CriteriaRegistry, CriteriaScope, ProviderError, StaticCatalog,
    };
    use accolade_core::error::RepoError;
    use accolade_core::ports::{AchievementSource, AwardHistory, RuleSource};
    use accolade_core::types::CandidateKey;
    use accolade_core::MatchingEngine;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::bus::EventBus;
    use crate::notifier::BusNotifier;

    const WRITER: DbId = 1;
    const BROKEN: DbId = 2;

    /// Every candidate named in the event satisfies the predicate.
    struct Echo(&'static str);

    #[async_trait]
    impl CriteriaProvider for Echo {
        fn name(&self) -> &'static str {
            self.0
        }

        fn scope(&self) -> CriteriaScope {
            CriteriaScope::Character
        }

        async fn current_members(
            &self,
            _params: &Value,
            account_id: Option<DbId>,
            character_id: Option<DbId>,
        ) -> Result<Vec<CandidateKey>, ProviderError> {
            Ok(account_id
                .zip(character_id)
                .map(CandidateKey::from)
                .into_iter()
                .collect())
        }
    }

    /// `PostCount` awards WRITER; `Broken` awards an achievement that does
    /// not exist, which fails the coordinator.
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
                let achievement = if trigger == "PostCount" { WRITER } else { BROKEN };
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
            Ok((achievement_id == WRITER).then(|| Achievement {
                id: WRITER,
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
            let awards = self.awards.lock().unwrap();
            Ok(awards
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

    fn coordinator(bus: &Arc<EventBus>) -> Arc<AwardCoordinator> {
        let store = Arc::new(Store {
            awards: Mutex::new(Vec::new()),
        });
        let catalog = StaticCatalog::new()
            .register_instance(Arc::new(Echo("PostCount")))
            .register_instance(Arc::new(Echo("Broken")));
        let registry = Arc::new(CriteriaRegistry::new(Arc::new(catalog)));
        let engine = MatchingEngine::new(registry, store.clone());
        let notifier = Arc::new(BusNotifier::new(Arc::clone(bus)));
        Arc::new(
            AwardCoordinator::new(engine, store.clone(), store, notifier).with_max_meta_depth(0),
        )
    }

    async fn next_awarded(rx: &mut broadcast::Receiver<AchievementEvent>) -> DbId {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for award")
                .unwrap();
            if let AchievementEvent::Awarded { achievement_id, .. } = event {
                return achievement_id;
            }
        }
    }

    #[tokio::test]
    async fn trigger_event_produces_award_notice() {
        let bus = Arc::new(EventBus::default());
        let mut observer = bus.subscribe();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(TriggerListener::run(
            coordinator(&bus),
            bus.subscribe(),
            cancel.clone(),
        ));

        bus.publish(AchievementEvent::trigger("PostCount", 1, 10));

        assert_eq!(next_awarded(&mut observer).await, WRITER);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn failing_trigger_does_not_stop_listener() {
        let bus = Arc::new(EventBus::default());
        let mut observer = bus.subscribe();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(TriggerListener::run(
            coordinator(&bus),
            bus.subscribe(),
            cancel.clone(),
        ));

        bus.publish(AchievementEvent::trigger("Broken", 1, 10));
        bus.publish(AchievementEvent::trigger("PostCount", 1, 10));

        assert_eq!(next_awarded(&mut observer).await, WRITER);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_bus_closes() {
        let bus = EventBus::default();
        let receiver = bus.subscribe();
        let notifier_bus = Arc::new(EventBus::default());
        let coordinator = coordinator(&notifier_bus);
        drop(bus);

        tokio::time::timeout(
            Duration::from_secs(5),
            TriggerListener::run(coordinator, receiver, CancellationToken::new()),
        )
        .await
        .expect("listener should exit once the bus is dropped");
    }
}
