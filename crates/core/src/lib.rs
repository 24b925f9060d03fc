//! Achievement criteria matching engine.
//!
//! Decides, for a named trigger event, which (account, character) pairs now
//! qualify for an achievement award or unlock:
//!
//! - [`criteria`]: the predicate provider contract and the registry that
//!   maps criteria-type names to providers.
//! - [`matching`]: OR-of-ANDs ruleset evaluation, incremental and retroactive.
//! - [`coordinator`]: turns matches into award/unlock records, notifications
//!   and meta-trigger re-evaluation.
//! - [`ports`]: storage and notification boundaries implemented elsewhere.
//!
//! This crate has no database dependencies; the PostgreSQL implementations
//! of the ports live in the db crate.

pub mod achievement;
pub mod config;
pub mod coordinator;
pub mod criteria;
pub mod error;
pub mod matching;
pub mod ports;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use coordinator::{AwardCoordinator, TriggerOutcome};
pub use matching::MatchingEngine;
