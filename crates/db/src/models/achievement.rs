//! Achievement definition model.

use accolade_core::achievement::{self as domain, AchievementType};
use accolade_core::error::RepoError;
use accolade_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `achievements` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Achievement {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub achievement_type: String,
    pub can_receive_multiple: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<Achievement> for domain::Achievement {
    type Error = RepoError;

    fn try_from(row: Achievement) -> Result<Self, Self::Error> {
        let achievement_type =
            AchievementType::from_str_value(&row.achievement_type).map_err(|e| {
                RepoError::Decode {
                    table: "achievements",
                    message: e.to_string(),
                }
            })?;
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            achievement_type,
            can_receive_multiple: row.can_receive_multiple,
        })
    }
}

/// DTO for creating a new achievement.
#[derive(Debug, Deserialize)]
pub struct CreateAchievement {
    pub name: String,
    pub description: Option<String>,
    pub achievement_type: AchievementType,
    pub can_receive_multiple: Option<bool>,
}
