//! Repository for the `achievement_rules` and `achievement_unlock_rules` tables.

use accolade_core::achievement::RuleKind;
use accolade_core::types::DbId;
use sqlx::PgPool;

use crate::models::rule::{AchievementRule, CreateAchievementRule};

/// Column list for rule queries.
const COLUMNS: &str =
    "id, achievement_id, ruleset_id, position, criteria_type, criteria_params, created_at";

/// Table holding the rules of `kind`.
fn table(kind: RuleKind) -> &'static str {
    match kind {
        RuleKind::Award => "achievement_rules",
        RuleKind::Unlock => "achievement_unlock_rules",
    }
}

/// Provides operations on award and unlock rules.
pub struct AchievementRuleRepo;

impl AchievementRuleRepo {
    /// Create a rule in `kind`'s table, returning the created row.
    pub async fn create(
        pool: &PgPool,
        kind: RuleKind,
        input: &CreateAchievementRule,
    ) -> Result<AchievementRule, sqlx::Error> {
        let query = format!(
            "INSERT INTO {table} (achievement_id, ruleset_id, position, criteria_type, criteria_params)
             VALUES ($1, $2, COALESCE($3, 0), $4, COALESCE($5, '{{}}'::jsonb))
             RETURNING {COLUMNS}",
            table = table(kind),
        );
        sqlx::query_as::<_, AchievementRule>(&query)
            .bind(input.achievement_id)
            .bind(input.ruleset_id)
            .bind(input.position)
            .bind(&input.criteria_type)
            .bind(&input.criteria_params)
            .fetch_one(pool)
            .await
    }

    /// Every rule of every ruleset containing at least one rule of
    /// `criteria_type`, ordered by achievement, ruleset and position.
    pub async fn list_for_trigger(
        pool: &PgPool,
        kind: RuleKind,
        criteria_type: &str,
    ) -> Result<Vec<AchievementRule>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {table}
             WHERE (achievement_id, ruleset_id) IN (
                 SELECT achievement_id, ruleset_id FROM {table} WHERE criteria_type = $1
             )
             ORDER BY achievement_id ASC, ruleset_id ASC, position ASC, id ASC",
            table = table(kind),
        );
        sqlx::query_as::<_, AchievementRule>(&query)
            .bind(criteria_type)
            .fetch_all(pool)
            .await
    }

    /// List all rules of an achievement in `kind`'s table.
    pub async fn list_for_achievement(
        pool: &PgPool,
        kind: RuleKind,
        achievement_id: DbId,
    ) -> Result<Vec<AchievementRule>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {table}
             WHERE achievement_id = $1
             ORDER BY ruleset_id ASC, position ASC, id ASC",
            table = table(kind),
        );
        sqlx::query_as::<_, AchievementRule>(&query)
            .bind(achievement_id)
            .fetch_all(pool)
            .await
    }
}
