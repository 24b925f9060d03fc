//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod achievement_repo;
pub mod award_repo;
pub mod rule_repo;
pub mod unlock_repo;

pub use achievement_repo::AchievementRepo;
pub use award_repo::{AwardRepo, HolderFilter};
pub use rule_repo::AchievementRuleRepo;
pub use unlock_repo::UnlockRepo;
