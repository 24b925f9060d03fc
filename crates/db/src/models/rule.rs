//! Award and unlock rule model.
//!
//! `achievement_rules` and `achievement_unlock_rules` share this shape.

use accolade_core::achievement::{Rule, RuleTree};
use accolade_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from `achievement_rules` or `achievement_unlock_rules`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AchievementRule {
    pub id: DbId,
    pub achievement_id: DbId,
    pub ruleset_id: DbId,
    pub position: i32,
    pub criteria_type: String,
    pub criteria_params: serde_json::Value,
    pub created_at: Timestamp,
}

/// DTO for creating a rule.
#[derive(Debug, Deserialize)]
pub struct CreateAchievementRule {
    pub achievement_id: DbId,
    pub ruleset_id: DbId,
    pub position: Option<i32>,
    pub criteria_type: String,
    pub criteria_params: Option<serde_json::Value>,
}

/// Group rows ordered by (achievement, ruleset, position) into a rule tree.
pub fn into_rule_tree(rows: Vec<AchievementRule>) -> RuleTree {
    let mut tree = RuleTree::new();
    for row in rows {
        tree.entry(row.achievement_id)
            .or_default()
            .entry(row.ruleset_id)
            .or_default()
            .push(Rule::new(row.criteria_type, row.criteria_params));
    }
    tree
}
