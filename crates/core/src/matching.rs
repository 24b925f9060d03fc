//! Achievement criteria matching.
//!
//! Given a trigger name, loads every achievement with a ruleset that
//! references that trigger, asks each rule's provider for its members, and
//! reports each (achievement, candidate) pair for which at least one ruleset
//! is fully satisfied. Each achievement is reported at most once per
//! candidate per pass.
//!
//! Two modes:
//!
//! - [`MatchingEngine::match_current`] evaluates what just happened, usually
//!   narrowed to one account/character, and collects eagerly.
//! - [`MatchingEngine::match_retroactive`] evaluates full history for
//!   backfill. The candidate space is unbounded, so rulesets are narrowed
//!   rule by rule and results stream out one achievement at a time.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};

use crate::achievement::{AchievementMatch, Rule, RuleKind, RuleTree, Rulesets};
use crate::config::PruningStrategy;
use crate::criteria::{CriteriaProvider, CriteriaRegistry, ProviderError};
use crate::error::EngineError;
use crate::ports::RuleSource;
use crate::types::{CandidateKey, DbId};

/// Evaluates triggers against configured achievement rules.
pub struct MatchingEngine {
    registry: Arc<CriteriaRegistry>,
    rules: Arc<dyn RuleSource>,
    pruning: PruningStrategy,
}

impl MatchingEngine {
    pub fn new(registry: Arc<CriteriaRegistry>, rules: Arc<dyn RuleSource>) -> Self {
        Self {
            registry,
            rules,
            pruning: PruningStrategy::default(),
        }
    }

    /// Select the retroactive pruning strategy.
    pub fn with_pruning(mut self, pruning: PruningStrategy) -> Self {
        self.pruning = pruning;
        self
    }

    pub fn registry(&self) -> &CriteriaRegistry {
        &self.registry
    }

    /// Match `trigger` against the rules in `kind`'s table using each
    /// provider's current members.
    ///
    /// Returns an empty list when `trigger` is not a registered criteria type.
    /// Output order carries no meaning.
    pub async fn match_current(
        &self,
        kind: RuleKind,
        trigger: &str,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> Result<Vec<AchievementMatch>, EngineError> {
        let Some(tree) = self.load(kind, trigger).await? else {
            return Ok(Vec::new());
        };

        let mut matches = Vec::new();
        for (&achievement_id, rulesets) in &tree {
            // candidate -> ruleset id -> rules matched
            let mut tally: BTreeMap<CandidateKey, HashMap<DbId, usize>> = BTreeMap::new();
            let mut required: HashMap<DbId, usize> = HashMap::new();

            for (&ruleset_id, rules) in rulesets {
                let Some(resolved) = self.resolve_ruleset(achievement_id, ruleset_id, rules) else {
                    continue;
                };
                required.insert(ruleset_id, resolved.len());

                for rule in &resolved {
                    for candidate in rule.current_members(account_id, character_id).await {
                        *tally
                            .entry(candidate)
                            .or_default()
                            .entry(ruleset_id)
                            .or_default() += 1;
                    }
                }
            }

            matches.extend(
                tally
                    .into_iter()
                    .filter(|(_, counts)| {
                        counts
                            .iter()
                            .any(|(ruleset_id, n)| required.get(ruleset_id) == Some(n))
                    })
                    .map(|(candidate, _)| AchievementMatch::new(achievement_id, candidate)),
            );
        }

        tracing::debug!(
            trigger,
            kind = kind.as_str(),
            achievements = tree.len(),
            matches = matches.len(),
            "Current criteria matched",
        );
        Ok(matches)
    }

    /// Match `trigger` against the rules in `kind`'s table using each
    /// provider's retroactive members.
    ///
    /// The returned stream evaluates one achievement at a time as it is
    /// polled. Rule loading happens up front so storage failures surface here.
    pub async fn match_retroactive<'a>(
        &'a self,
        kind: RuleKind,
        trigger: &str,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> Result<BoxStream<'a, AchievementMatch>, EngineError> {
        let Some(tree) = self.load(kind, trigger).await? else {
            return Ok(stream::empty().boxed());
        };

        tracing::debug!(
            trigger,
            kind = kind.as_str(),
            achievements = tree.len(),
            pruning = self.pruning.as_str(),
            "Retroactive matching started",
        );

        Ok(stream::iter(tree)
            .then(move |(achievement_id, rulesets)| async move {
                self.retroactive_achievement(achievement_id, &rulesets, account_id, character_id)
                    .await
            })
            .flat_map(stream::iter)
            .boxed())
    }

    async fn load(&self, kind: RuleKind, trigger: &str) -> Result<Option<RuleTree>, EngineError> {
        if !self.registry.is_known(trigger) {
            tracing::debug!(trigger, "Trigger is not a registered criteria type, skipping");
            return Ok(None);
        }
        let tree = self.rules.rules_for_trigger(kind, trigger).await?;
        Ok(Some(tree))
    }

    /// Pair each rule with its provider, or `None` if any rule cannot be
    /// resolved (the whole ruleset is abandoned) or the ruleset is empty.
    fn resolve_ruleset<'r>(
        &self,
        achievement_id: DbId,
        ruleset_id: DbId,
        rules: &'r [Rule],
    ) -> Option<Vec<ResolvedRule<'r>>> {
        if rules.is_empty() {
            return None;
        }
        rules
            .iter()
            .map(|rule| match self.registry.resolve(&rule.criteria_type) {
                Some(provider) => Some(ResolvedRule {
                    achievement_id,
                    ruleset_id,
                    rule,
                    provider,
                }),
                None => {
                    tracing::warn!(
                        achievement_id,
                        ruleset_id,
                        criteria_type = %rule.criteria_type,
                        "Unregistered criteria type, skipping ruleset",
                    );
                    None
                }
            })
            .collect()
    }

    async fn retroactive_achievement(
        &self,
        achievement_id: DbId,
        rulesets: &Rulesets,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> Vec<AchievementMatch> {
        let mut satisfied = BTreeSet::new();
        for (&ruleset_id, rules) in rulesets {
            let Some(resolved) = self.resolve_ruleset(achievement_id, ruleset_id, rules) else {
                continue;
            };
            let survivors = match self.pruning {
                PruningStrategy::Eager => prune_eagerly(&resolved, account_id, character_id).await,
                PruningStrategy::Tally => {
                    tally_then_filter(&resolved, account_id, character_id).await
                }
            };
            satisfied.extend(survivors);
        }
        satisfied
            .into_iter()
            .map(|candidate| AchievementMatch::new(achievement_id, candidate))
            .collect()
    }
}

/// Evaluate a ruleset's rules in order, keeping only candidates that have
/// matched every rule seen so far. Later rules never add candidates, and
/// evaluation stops once nobody is left.
async fn prune_eagerly(
    resolved: &[ResolvedRule<'_>],
    account_id: Option<DbId>,
    character_id: Option<DbId>,
) -> HashSet<CandidateKey> {
    let mut survivors: Option<HashSet<CandidateKey>> = None;
    for rule in resolved {
        let next = rule
            .retroactive_members(account_id, character_id, survivors.as_ref())
            .await;
        if next.is_empty() {
            tracing::debug!(
                achievement_id = rule.achievement_id,
                ruleset_id = rule.ruleset_id,
                criteria_type = %rule.rule.criteria_type,
                "No candidates left, ruleset pruned",
            );
            return next;
        }
        survivors = Some(next);
    }
    survivors.unwrap_or_default()
}

/// Count every rule for every candidate, then keep full counts.
async fn tally_then_filter(
    resolved: &[ResolvedRule<'_>],
    account_id: Option<DbId>,
    character_id: Option<DbId>,
) -> HashSet<CandidateKey> {
    let mut counts: HashMap<CandidateKey, usize> = HashMap::new();
    for rule in resolved {
        for candidate in rule.retroactive_members(account_id, character_id, None).await {
            *counts.entry(candidate).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n == resolved.len())
        .map(|(candidate, _)| candidate)
        .collect()
}

/// A rule paired with the provider that evaluates it.
struct ResolvedRule<'r> {
    achievement_id: DbId,
    ruleset_id: DbId,
    rule: &'r Rule,
    provider: Arc<dyn CriteriaProvider>,
}

impl ResolvedRule<'_> {
    /// Distinct current members; a provider failure yields none.
    async fn current_members(
        &self,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> HashSet<CandidateKey> {
        match self
            .provider
            .current_members(&self.rule.criteria_params, account_id, character_id)
            .await
        {
            Ok(members) => members.into_iter().collect(),
            Err(e) => {
                self.log_failure(&e);
                HashSet::new()
            }
        }
    }

    /// Distinct retroactive members, restricted to `within` when given.
    /// A failure part-way through discards everything seen for this rule.
    async fn retroactive_members(
        &self,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
        within: Option<&HashSet<CandidateKey>>,
    ) -> HashSet<CandidateKey> {
        let mut members = HashSet::new();
        let mut stream =
            self.provider
                .retroactive_members(&self.rule.criteria_params, account_id, character_id);
        while let Some(item) = stream.next().await {
            match item {
                Ok(candidate) => {
                    if within.map_or(true, |keep| keep.contains(&candidate)) {
                        members.insert(candidate);
                    }
                }
                Err(e) => {
                    self.log_failure(&e);
                    return HashSet::new();
                }
            }
        }
        members
    }

    fn log_failure(&self, error: &ProviderError) {
        tracing::warn!(
            achievement_id = self.achievement_id,
            ruleset_id = self.ruleset_id,
            criteria_type = %self.rule.criteria_type,
            error = %error,
            "Criteria provider failed, rule contributes no matches",
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
