//! Predicate provider contract.
//!
//! A [`CriteriaProvider`] answers one question for one rule: which
//! (account, character) pairs satisfy this predicate right now? Providers
//! are registered by name in the [`CriteriaRegistry`](super::CriteriaRegistry)
//! and are only ever called through this trait.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CandidateKey, DbId};

/// Capability class of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaScope {
    /// Evaluates a property of the account as a whole.
    Account,
    /// Evaluates a property of an individual character.
    Character,
}

impl CriteriaScope {
    /// Both capability classes, in discovery order.
    pub const ALL: [CriteriaScope; 2] = [CriteriaScope::Account, CriteriaScope::Character];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Character => "character",
        }
    }
}

/// Errors a provider may raise while evaluating a rule.
///
/// The matching engine isolates these per rule: a failing rule contributes
/// no matches and evaluation continues.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Invalid criteria parameters for {criteria_type}: {message}")]
    InvalidParams {
        criteria_type: &'static str,
        message: String,
    },

    #[error("Criteria query failed: {0}")]
    Query(String),
}

/// A pluggable predicate evaluated for one rule.
///
/// `account_id` / `character_id` optionally narrow evaluation to a known
/// candidate. When both are `None` the provider evaluates whichever
/// candidates are naturally in scope.
///
/// The members returned carry no ordering and may contain duplicates; the
/// engine treats them as a set.
#[async_trait]
pub trait CriteriaProvider: Send + Sync {
    /// Short name rules refer to this provider by (e.g. `"PostCount"`).
    fn name(&self) -> &'static str;

    /// Which capability class this provider implements.
    fn scope(&self) -> CriteriaScope;

    /// Candidates satisfying the predicate given the event that just happened.
    async fn current_members(
        &self,
        params: &Value,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> Result<Vec<CandidateKey>, ProviderError>;

    /// Candidates satisfying the predicate against the full historical state.
    ///
    /// May enumerate the whole member population, so implementations backed
    /// by storage should stream rather than collect. The default evaluates
    /// [`current_members`](Self::current_members) once and streams the result.
    fn retroactive_members<'a>(
        &'a self,
        params: &'a Value,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
    ) -> BoxStream<'a, Result<CandidateKey, ProviderError>> {
        stream::once(self.current_members(params, account_id, character_id))
            .flat_map(|result| match result {
                Ok(keys) => stream::iter(keys.into_iter().map(Ok)).left_stream(),
                Err(e) => stream::iter(std::iter::once(Err(e))).right_stream(),
            })
            .boxed()
    }
}

/// Deserialize a provider's JSON parameters, mapping failures to
/// [`ProviderError::InvalidParams`].
pub fn parse_params<T: serde::de::DeserializeOwned>(
    criteria_type: &'static str,
    params: &Value,
) -> Result<T, ProviderError> {
    T::deserialize(params).map_err(|e| ProviderError::InvalidParams {
        criteria_type,
        message: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use futures::TryStreamExt;
    use serde_json::json;

    use super::*;
    use crate::test_helpers::StaticProvider;

    #[derive(Debug, Deserialize)]
    struct Threshold {
        count: i64,
    }

    #[test]
    fn parse_params_reads_object() {
        let parsed: Threshold = parse_params("PostCount", &json!({"count": 10})).unwrap();
        assert_eq!(parsed.count, 10);
    }

    #[test]
    fn parse_params_rejects_missing_field() {
        let result = parse_params::<Threshold>("PostCount", &json!({}));
        assert_matches!(
            result,
            Err(ProviderError::InvalidParams {
                criteria_type: "PostCount",
                ..
            })
        );
    }

    #[tokio::test]
    async fn default_retroactive_members_streams_current_members() {
        let provider = StaticProvider::new("AccountAge", &[(42, 7), (43, 1)]);
        let params = json!({});
        let keys: Vec<CandidateKey> = provider
            .retroactive_members(&params, None, None)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(keys, vec![CandidateKey::new(42, 7), CandidateKey::new(43, 1)]);
    }

    #[tokio::test]
    async fn default_retroactive_members_surfaces_failure() {
        let provider = StaticProvider::failing("Broken");
        let params = json!({});
        let result: Result<Vec<CandidateKey>, _> = provider
            .retroactive_members(&params, None, None)
            .try_collect()
            .await;
        assert_matches!(result, Err(ProviderError::Query(_)));
    }
}
