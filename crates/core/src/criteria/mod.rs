//! Pluggable predicate providers and the registry that names them.

pub mod provider;
pub mod registry;

pub use provider::{parse_params, CriteriaProvider, CriteriaScope, ProviderError};
pub use registry::{CriteriaRegistry, ProviderCatalog, ProviderFactory, StaticCatalog};
