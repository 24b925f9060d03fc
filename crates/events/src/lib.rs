//! Achievement event bus and trigger plumbing.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`AchievementEvent`]: trigger events in, award/unlock notices out.
//! - [`BusNotifier`]: notification sink that publishes onto the bus.
//! - [`TriggerListener`]: background task running the award coordinator
//!   for every trigger event.
//! - [`NoticeLog`]: background task logging every award and unlock.

pub mod bus;
pub mod listener;
pub mod notice_log;
pub mod notifier;

pub use bus::{AchievementEvent, EventBus};
pub use listener::TriggerListener;
pub use notice_log::NoticeLog;
pub use notifier::BusNotifier;
