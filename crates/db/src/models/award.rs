//! Award history model.

use accolade_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `achievement_awards` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AchievementAward {
    pub id: DbId,
    pub achievement_id: DbId,
    pub account_id: DbId,
    pub character_id: DbId,
    pub awarded_time: Timestamp,
    pub awarded_by: Option<DbId>,
}

