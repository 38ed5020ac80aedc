pub mod add;
pub mod change;
pub mod exists;
pub mod get;
pub mod remove;

use tokio::sync::broadcast;

use crate::db::DbConn;
use crate::models::{Message, Room};

const FEED_CAPACITY: usize = 256;

/// Row-level change notification, scoped by room id. Mutating store calls
/// publish one of these after the write commits; clients fold them into
/// their local mirrors instead of polling.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    MessageInserted(Message),
    MessageDeleted { room_id: String, message_id: String },
    ParticipantInserted { room_id: String },
    ParticipantUpdated { room_id: String },
    ParticipantDeleted { room_id: String },
    RoomUpdated(Room),
}

impl StoreEvent {
    pub fn room_id(&self) -> &str {
        match self {
            StoreEvent::MessageInserted(m) => &m.room_id,
            StoreEvent::MessageDeleted { room_id, .. } => room_id,
            StoreEvent::ParticipantInserted { room_id } => room_id,
            StoreEvent::ParticipantUpdated { room_id } => room_id,
            StoreEvent::ParticipantDeleted { room_id } => room_id,
            StoreEvent::RoomUpdated(r) => &r.id,
        }
    }
}

#[derive(Clone)]
pub struct Store {
    pub pool: DbConn,
    events: broadcast::Sender<StoreEvent>,
}

impl Store {
    pub fn new(pool: DbConn) -> Self {
        let (events, _) = broadcast::channel(FEED_CAPACITY);
        Self { pool, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Best effort: a send only fails when nobody is subscribed, which is
    /// not an error for the writer.
    pub(crate) fn publish(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}
