//! Achievement domain model.
//!
//! Achievements are satisfied under an OR-of-ANDs policy: an achievement
//! matches a candidate when any one of its rulesets is fully satisfied,
//! and a ruleset is satisfied only when every one of its rules is matched
//! by the same candidate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{CandidateKey, DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const TYPE_ACCOUNT: &str = "account";
pub const TYPE_CHARACTER: &str = "character";

/// All valid achievement type strings.
pub const VALID_ACHIEVEMENT_TYPES: &[&str] = &[TYPE_ACCOUNT, TYPE_CHARACTER];

/// Meta-trigger fired after an account-scoped award or unlock.
pub const TRIGGER_ACCOUNT_META: &str = "AccountMetaAchievement";
/// Meta-trigger fired after a character-scoped award or unlock.
pub const TRIGGER_CHARACTER_META: &str = "CharacterMetaAchievement";
/// Meta-trigger fired after any award or unlock.
pub const TRIGGER_META: &str = "MetaAchievement";

/// The meta-triggers re-evaluated after every award and unlock, in firing order.
pub const META_TRIGGERS: &[&str] = &[TRIGGER_ACCOUNT_META, TRIGGER_CHARACTER_META, TRIGGER_META];

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether an achievement belongs to an account as a whole or to one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementType {
    Account,
    Character,
}

impl AchievementType {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            TYPE_ACCOUNT => Ok(Self::Account),
            TYPE_CHARACTER => Ok(Self::Character),
            _ => Err(CoreError::Validation(format!(
                "Invalid achievement type '{s}'. Must be one of: {}",
                VALID_ACHIEVEMENT_TYPES.join(", ")
            ))),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => TYPE_ACCOUNT,
            Self::Character => TYPE_CHARACTER,
        }
    }
}

/// Which rule table a matching pass reads from.
///
/// Award rules grant the achievement; unlock rules only reveal it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Award,
    Unlock,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Award => "award",
            Self::Unlock => "unlock",
        }
    }
}

/// What a notification announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Award,
    Unlock,
}

impl From<RuleKind> for NoticeKind {
    fn from(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Award => Self::Award,
            RuleKind::Unlock => Self::Unlock,
        }
    }
}

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

/// An achievement definition as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub achievement_type: AchievementType,
    pub can_receive_multiple: bool,
}

/// A single rule: which predicate provider to ask and with what parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub criteria_type: String,
    pub criteria_params: serde_json::Value,
}

impl Rule {
    pub fn new(criteria_type: impl Into<String>, criteria_params: serde_json::Value) -> Self {
        Self {
            criteria_type: criteria_type.into(),
            criteria_params,
        }
    }
}

/// Ruleset id -> ordered rules.
pub type Rulesets = BTreeMap<DbId, Vec<Rule>>;

/// Achievement id -> ruleset id -> ordered rules.
///
/// Ordered maps keep evaluation and log output stable between runs.
pub type RuleTree = BTreeMap<DbId, Rulesets>;

/// One (achievement, candidate) pair that satisfied at least one complete ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AchievementMatch {
    pub achievement_id: DbId,
    pub account_id: DbId,
    pub character_id: DbId,
}

impl AchievementMatch {
    pub fn new(achievement_id: DbId, candidate: CandidateKey) -> Self {
        Self {
            achievement_id,
            account_id: candidate.account_id,
            character_id: candidate.character_id,
        }
    }

    pub fn candidate(&self) -> CandidateKey {
        CandidateKey::new(self.account_id, self.character_id)
    }
}

/// DTO for writing an award record.
#[derive(Debug, Clone)]
pub struct NewAward {
    pub achievement_id: DbId,
    pub achievement_type: AchievementType,
    pub account_id: DbId,
    pub character_id: DbId,
    pub awarded_time: Timestamp,
    /// `None` when granted automatically by the engine.
    pub awarded_by: Option<DbId>,
}

/// DTO for writing an unlock record.
#[derive(Debug, Clone)]
pub struct NewUnlock {
    pub achievement_id: DbId,
    pub achievement_type: AchievementType,
    pub account_id: DbId,
    pub character_id: DbId,
    pub unlock_time: Timestamp,
}

/// Award and unlock history for one candidate, as read by the coordinator.
///
/// Account-scoped achievements are counted across every character of the
/// account, so `character_id` is only applied for character-scoped ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryScope {
    pub achievement_id: DbId,
    pub account_id: DbId,
    pub character_id: Option<DbId>,
}

impl HistoryScope {
    pub fn for_match(achievement: &Achievement, m: &AchievementMatch) -> Self {
        let character_id = match achievement.achievement_type {
            AchievementType::Account => None,
            AchievementType::Character => Some(m.character_id),
        };
        Self {
            achievement_id: m.achievement_id,
            account_id: m.account_id,
            character_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
