//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>`. Trigger events are published
//! by whatever performed the user-facing action; award and unlock notices
//! are published by [`BusNotifier`](crate::notifier::BusNotifier).

use accolade_core::achievement::NoticeKind;
use accolade_core::ports::AchievementNotice;
use accolade_core::types::DbId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// AchievementEvent
// ---------------------------------------------------------------------------

/// An event carried on the achievement bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AchievementEvent {
    /// Something happened that may satisfy rules of criteria type `name`.
    Trigger {
        name: String,
        account_id: Option<DbId>,
        character_id: Option<DbId>,
        /// Evaluate against full history instead of the current event.
        retroactive: bool,
    },
    /// An achievement was awarded.
    Awarded {
        achievement_id: DbId,
        account_id: DbId,
        character_id: DbId,
        timestamp: DateTime<Utc>,
    },
    /// An achievement was revealed without being awarded.
    Unlocked {
        achievement_id: DbId,
        account_id: DbId,
        character_id: DbId,
        timestamp: DateTime<Utc>,
    },
}

impl AchievementEvent {
    /// A trigger for an event that just happened to one candidate.
    pub fn trigger(name: impl Into<String>, account_id: DbId, character_id: DbId) -> Self {
        Self::Trigger {
            name: name.into(),
            account_id: Some(account_id),
            character_id: Some(character_id),
            retroactive: false,
        }
    }

    /// A retroactive trigger covering every candidate.
    pub fn backfill(name: impl Into<String>) -> Self {
        Self::Trigger {
            name: name.into(),
            account_id: None,
            character_id: None,
            retroactive: true,
        }
    }
}

impl From<AchievementNotice> for AchievementEvent {
    fn from(notice: AchievementNotice) -> Self {
        let timestamp = Utc::now();
        match notice.kind {
            NoticeKind::Award => Self::Awarded {
                achievement_id: notice.achievement_id,
                account_id: notice.account_id,
                character_id: notice.character_id,
                timestamp,
            },
            NoticeKind::Unlock => Self::Unlocked {
                achievement_id: notice.achievement_id,
                account_id: notice.account_id,
                character_id: notice.character_id,
                timestamp,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use accolade_events::bus::{AchievementEvent, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(AchievementEvent::trigger("PostCount", 1, 10));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<AchievementEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped silently when
    /// nobody is subscribed.
    pub fn publish(&self, event: AchievementEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AchievementEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
