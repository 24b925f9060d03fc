use serde::{Deserialize, Serialize};

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// The (account, character) pair a rule is evaluated against.
///
/// For account-scoped achievements the character is the account's own
/// out-of-character ("main") character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateKey {
    pub account_id: DbId,
    pub character_id: DbId,
}

impl CandidateKey {
    pub fn new(account_id: DbId, character_id: DbId) -> Self {
        Self {
            account_id,
            character_id,
        }
    }
}

impl From<(DbId, DbId)> for CandidateKey {
    fn from((account_id, character_id): (DbId, DbId)) -> Self {
        Self::new(account_id, character_id)
    }
}
