//! Background task logging award and unlock notices.
//!
//! [`NoticeLog`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes one structured log line per [`AchievementEvent::Awarded`] or
//! [`AchievementEvent::Unlocked`]. It runs until every bus handle is dropped,
//! draining whatever is still buffered.

use tokio::sync::broadcast;

use crate::bus::AchievementEvent;

/// Logs every award and unlock published on the bus.
pub struct NoticeLog;

impl NoticeLog {
    /// Run the logging loop. Returns how many notices were logged.
    pub async fn run(mut receiver: broadcast::Receiver<AchievementEvent>) -> u64 {
        let mut logged = 0;
        loop {
            match receiver.recv().await {
                Ok(AchievementEvent::Awarded {
                    achievement_id,
                    account_id,
                    character_id,
                    ..
                }) => {
                    tracing::info!(achievement_id, account_id, character_id, "Achievement awarded");
                    logged += 1;
                }
                Ok(AchievementEvent::Unlocked {
                    achievement_id,
                    account_id,
                    character_id,
                    ..
                }) => {
                    tracing::info!(achievement_id, account_id, character_id, "Achievement unlocked");
                    logged += 1;
                }
                Ok(AchievementEvent::Trigger { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notice log lagged, some notices were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!(logged, "Event bus closed, notice log shutting down");
                    break;
                }
            }
        }
        logged
    }
}
