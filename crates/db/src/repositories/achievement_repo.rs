//! Repository for the `achievements` table.

use accolade_core::types::DbId;
use sqlx::PgPool;

use crate::models::achievement::{Achievement, CreateAchievement};

/// Column list for achievements queries.
const COLUMNS: &str =
    "id, name, description, achievement_type, can_receive_multiple, created_at, updated_at";

/// Provides CRUD operations for achievement definitions.
pub struct AchievementRepo;

impl AchievementRepo {
    /// Create a new achievement, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateAchievement,
    ) -> Result<Achievement, sqlx::Error> {
        let query = format!(
            "INSERT INTO achievements (name, description, achievement_type, can_receive_multiple)
             VALUES ($1, $2, $3, COALESCE($4, false))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Achievement>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.achievement_type.as_str())
            .bind(input.can_receive_multiple)
            .fetch_one(pool)
            .await
    }

    /// Find an achievement by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Achievement>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM achievements WHERE id = $1");
        sqlx::query_as::<_, Achievement>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Delete an achievement by ID. Returns `true` if a row was deleted.
    ///
    /// Rules and history for the achievement are removed by cascade.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM achievements WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
