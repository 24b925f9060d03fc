//! Notification sink publishing award and unlock notices onto the bus.

use std::sync::Arc;

use accolade_core::ports::{AchievementNotice, NotificationSink};

use crate::bus::{AchievementEvent, EventBus};

/// Publishes every notice as an [`AchievementEvent::Awarded`] or
/// [`AchievementEvent::Unlocked`].
pub struct BusNotifier {
    bus: Arc<EventBus>,
}

impl BusNotifier {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl NotificationSink for BusNotifier {
    fn notify(&self, notice: AchievementNotice) {
        tracing::debug!(
            achievement_id = notice.achievement_id,
            account_id = notice.account_id,
            character_id = notice.character_id,
            "Publishing achievement notice",
        );
        self.bus.publish(AchievementEvent::from(notice));
    }
}
