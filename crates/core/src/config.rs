//! Engine configuration loaded from environment variables.

use crate::error::CoreError;

/// Default nesting limit for meta-trigger re-evaluation.
pub const DEFAULT_MAX_META_DEPTH: u32 = 1;

pub const PRUNING_EAGER: &str = "eager";
pub const PRUNING_TALLY: &str = "tally";

/// How retroactive matching narrows the candidate set within a ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PruningStrategy {
    /// Drop a candidate as soon as it misses any rule evaluated so far.
    /// Memory stays bounded by the first rule's member set.
    #[default]
    Eager,
    /// Count every rule for every candidate, then keep full counts.
    Tally,
}

impl PruningStrategy {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            PRUNING_EAGER => Ok(Self::Eager),
            PRUNING_TALLY => Ok(Self::Tally),
            _ => Err(CoreError::Validation(format!(
                "Invalid pruning strategy '{s}'. Must be one of: {PRUNING_EAGER}, {PRUNING_TALLY}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eager => PRUNING_EAGER,
            Self::Tally => PRUNING_TALLY,
        }
    }
}

/// Tunables for the matching engine and award coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many levels of meta-trigger re-evaluation may nest below the
    /// original trigger. `0` disables meta-triggers.
    pub max_meta_depth: u32,
    /// Retroactive pruning strategy.
    pub pruning: PruningStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_meta_depth: DEFAULT_MAX_META_DEPTH,
            pruning: PruningStrategy::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default |
    /// |-----------------------------------|---------|
    /// | `ACHIEVEMENT_MAX_META_DEPTH`      | `1`     |
    /// | `ACHIEVEMENT_RETROACTIVE_PRUNING` | `eager` |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_meta_depth = match lookup("ACHIEVEMENT_MAX_META_DEPTH") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                CoreError::Validation(format!(
                    "ACHIEVEMENT_MAX_META_DEPTH must be a non-negative integer, got '{raw}'"
                ))
            })?,
            None => DEFAULT_MAX_META_DEPTH,
        };

        let pruning = match lookup("ACHIEVEMENT_RETROACTIVE_PRUNING") {
            Some(raw) => PruningStrategy::from_str_value(raw.trim())?,
            None => PruningStrategy::default(),
        };

        Ok(Self {
            max_meta_depth,
            pruning,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
