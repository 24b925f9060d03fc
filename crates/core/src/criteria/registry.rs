//! Criteria registry: criteria-type name -> provider.
//!
//! Providers are registered explicitly in a [`ProviderCatalog`] at start-up.
//! The registry asks the catalog for every provider of both capability
//! classes the first time a name is resolved, and keeps the resulting map
//! until [`CriteriaRegistry::reset`] starts a new cache generation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::provider::{CriteriaProvider, CriteriaScope};

/// Constructs a provider instance. Factories may capture shared state
/// such as a connection pool.
pub type ProviderFactory = Arc<dyn Fn() -> Arc<dyn CriteriaProvider> + Send + Sync>;

/// Source of installed providers, grouped by capability class.
pub trait ProviderCatalog: Send + Sync {
    /// Factories for every provider implementing `scope`.
    fn providers_implementing(&self, scope: CriteriaScope) -> Vec<ProviderFactory>;
}

/// A catalog populated by explicit `register` calls.
#[derive(Default, Clone)]
pub struct StaticCatalog {
    entries: Vec<(CriteriaScope, ProviderFactory)>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider factory under a capability class.
    pub fn register<F>(mut self, scope: CriteriaScope, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn CriteriaProvider> + Send + Sync + 'static,
    {
        self.entries.push((scope, Arc::new(factory)));
        self
    }

    /// Register an already-built provider; every resolution shares the instance.
    pub fn register_instance(self, provider: Arc<dyn CriteriaProvider>) -> Self {
        let scope = provider.scope();
        self.register(scope, move || Arc::clone(&provider))
    }

    /// Append every entry of `other`.
    pub fn extend(mut self, other: StaticCatalog) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for StaticCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCatalog")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ProviderCatalog for StaticCatalog {
    fn providers_implementing(&self, scope: CriteriaScope) -> Vec<ProviderFactory> {
        self.entries
            .iter()
            .filter(|(s, _)| *s == scope)
            .map(|(_, factory)| Arc::clone(factory))
            .collect()
    }
}

type ProviderMap = HashMap<&'static str, Arc<dyn CriteriaProvider>>;

/// Lazily-built lookup from criteria-type name to provider.
pub struct CriteriaRegistry {
    catalog: Arc<dyn ProviderCatalog>,
    providers: OnceLock<ProviderMap>,
}

impl CriteriaRegistry {
    pub fn new(catalog: Arc<dyn ProviderCatalog>) -> Self {
        Self {
            catalog,
            providers: OnceLock::new(),
        }
    }

    /// Look up the provider for `criteria_type`.
    pub fn resolve(&self, criteria_type: &str) -> Option<Arc<dyn CriteriaProvider>> {
        self.providers().get(criteria_type).cloned()
    }

    /// Whether `criteria_type` names a registered provider.
    pub fn is_known(&self, criteria_type: &str) -> bool {
        self.providers().contains_key(criteria_type)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers().keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Drop the cached map; the next lookup rescans the catalog.
    pub fn reset(&mut self) {
        self.providers = OnceLock::new();
    }

    fn providers(&self) -> &ProviderMap {
        self.providers.get_or_init(|| build_map(self.catalog.as_ref()))
    }
}

impl fmt::Debug for CriteriaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CriteriaRegistry")
            .field("built", &self.providers.get().is_some())
            .finish()
    }
}

fn build_map(catalog: &dyn ProviderCatalog) -> ProviderMap {
    let mut map = ProviderMap::new();
    for scope in CriteriaScope::ALL {
        for factory in catalog.providers_implementing(scope) {
            let provider = factory();
            let name = provider.name();
            if provider.scope() != scope {
                tracing::warn!(
                    criteria_type = name,
                    listed_as = scope.as_str(),
                    implements = provider.scope().as_str(),
                    "Provider listed under the wrong capability, skipping",
                );
                continue;
            }
            if map.contains_key(name) {
                tracing::warn!(
                    criteria_type = name,
                    "Duplicate criteria provider name, keeping the first registration",
                );
                continue;
            }
            map.insert(name, provider);
        }
    }
    tracing::debug!(providers = map.len(), "Criteria registry built");
    map
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
