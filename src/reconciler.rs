use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::models::{Message, Participant, Room};
use crate::store::{Store, StoreEvent};

/// Local mirrors of the room's authoritative state. Only the feed task
/// writes them once a session is joined; everything user-visible reads from
/// here, never from the store directly.
#[derive(Debug, Default, Clone)]
pub struct RoomView {
    pub room: Option<Room>,
    pub messages: Vec<Message>,
    pub participants: Vec<Participant>,
}

impl RoomView {
    pub fn clear(&mut self) {
        self.room = None;
        self.messages.clear();
        self.participants.clear();
    }
}

pub type SharedView = Arc<Mutex<RoomView>>;

/// Folds one change event into the mirrors.
///
/// Messages are patched incrementally: inserts append (the store delivers
/// them in commit order per room), deletes remove by id and a miss is a
/// no-op so a delete racing a full refresh stays harmless. Participant
/// events of any kind trigger a wholesale refetch of the live set, because
/// a bare row event cannot distinguish mute-toggle from ban from rename.
/// Room updates replace the room record wholesale.
pub async fn apply(store: &Store, room_id: &str, view: &SharedView, event: StoreEvent) {
    match event {
        StoreEvent::MessageInserted(message) => {
            let mut view = view.lock().unwrap();
            view.messages.push(message);
        }
        StoreEvent::MessageDeleted { message_id, .. } => {
            let mut view = view.lock().unwrap();
            view.messages.retain(|m| m.id != message_id);
        }
        StoreEvent::ParticipantInserted { .. }
        | StoreEvent::ParticipantUpdated { .. }
        | StoreEvent::ParticipantDeleted { .. } => match store.get_live_participants(room_id).await {
            Ok(participants) => {
                let mut view = view.lock().unwrap();
                view.participants = participants;
            }
            Err(e) => warn!("participant refetch for room {} failed: {}", room_id, e),
        },
        StoreEvent::RoomUpdated(room) => {
            let mut view = view.lock().unwrap();
            view.room = Some(room);
        }
    }
}

/// Rebuilds all three mirrors from the store; used to seed a session and to
/// recover after the feed lags.
pub async fn resync(store: &Store, room_id: &str, view: &SharedView) -> anyhow::Result<()> {
    let room = store.get_room(room_id).await?;
    let messages = store.get_messages(room_id).await?;
    let participants = store.get_live_participants(room_id).await?;

    let mut view = view.lock().unwrap();
    view.room = room;
    view.messages = messages;
    view.participants = participants;
    Ok(())
}

/// Single writer of the mirrors for one joined session. Aborted on leave
/// and before any re-subscribe, so a room switch never leaves a ghost
/// subscription double-delivering events.
pub fn spawn_feed(
    store: Store,
    room_id: String,
    view: SharedView,
    mut rx: broadcast::Receiver<StoreEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if event.room_id() != room_id {
                        continue;
                    }
                    apply(&store, &room_id, &view, event).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "change feed for room {} lagged by {} events, resyncing",
                        room_id, skipped
                    );
                    if let Err(e) = resync(&store, &room_id, &view).await {
                        warn!("resync for room {} failed: {}", room_id, e);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("change feed for room {} closed", room_id);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn shared() -> SharedView {
        Arc::new(Mutex::new(RoomView::default()))
    }

    #[tokio::test]
    async fn message_insert_appends_in_order() {
        let store = testutil::store().await;
        let room = store.add_room("AB3D9K", "room", "H1").await.unwrap();
        let view = shared();

        let a = Message::system(&room.id, None, "System", "one".into());
        let b = Message::system(&room.id, None, "System", "two".into());
        apply(&store, &room.id, &view, StoreEvent::MessageInserted(a.clone())).await;
        apply(&store, &room.id, &view, StoreEvent::MessageInserted(b.clone())).await;

        let v = view.lock().unwrap();
        assert_eq!(v.messages.len(), 2);
        assert_eq!(v.messages[0].id, a.id);
        assert_eq!(v.messages[1].id, b.id);
    }

    #[tokio::test]
    async fn delete_for_missing_id_is_a_no_op() {
        let store = testutil::store().await;
        let room = store.add_room("AB3D9K", "room", "H1").await.unwrap();
        let view = shared();

        let m = Message::system(&room.id, None, "System", "keep".into());
        apply(&store, &room.id, &view, StoreEvent::MessageInserted(m.clone())).await;
        apply(
            &store,
            &room.id,
            &view,
            StoreEvent::MessageDeleted {
                room_id: room.id.clone(),
                message_id: "never-existed".into(),
            },
        )
        .await;

        let v = view.lock().unwrap();
        assert_eq!(v.messages.len(), 1);
        assert_eq!(v.messages[0].id, m.id);
    }

    #[tokio::test]
    async fn participant_events_replace_the_live_set_wholesale() {
        let store = testutil::store().await;
        let room = store.add_room("AB3D9K", "room", "H1").await.unwrap();
        let view = shared();

        let p = store.add_participant(&room.id, "alice", "U1").await.unwrap();
        apply(
            &store,
            &room.id,
            &view,
            StoreEvent::ParticipantInserted {
                room_id: room.id.clone(),
            },
        )
        .await;
        assert_eq!(view.lock().unwrap().participants.len(), 1);

        // A ban drops the row from the live set on the next event.
        store.change_banned(&p.id, &room.id, true).await.unwrap();
        apply(
            &store,
            &room.id,
            &view,
            StoreEvent::ParticipantUpdated {
                room_id: room.id.clone(),
            },
        )
        .await;
        assert!(view.lock().unwrap().participants.is_empty());
    }

    #[tokio::test]
    async fn room_update_replaces_the_record() {
        let store = testutil::store().await;
        let room = store.add_room("AB3D9K", "room", "H1").await.unwrap();
        let view = shared();
        view.lock().unwrap().room = Some(room.clone());

        let mut locked = room.clone();
        locked.is_locked = true;
        apply(&store, &room.id, &view, StoreEvent::RoomUpdated(locked)).await;

        assert!(view.lock().unwrap().room.as_ref().unwrap().is_locked);
    }

    #[tokio::test]
    async fn feed_task_ignores_other_rooms() {
        let store = testutil::store().await;
        let ours = store.add_room("AB3D9K", "ours", "H1").await.unwrap();
        let theirs = store.add_room("QQQQQQ", "theirs", "H2").await.unwrap();

        let view = shared();
        let handle = spawn_feed(store.clone(), ours.id.clone(), view.clone(), store.subscribe());

        let noise = Message::system(&theirs.id, None, "System", "noise".into());
        store.add_message(&noise).await.unwrap();
        let signal = Message::system(&ours.id, None, "System", "signal".into());
        store.add_message(&signal).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.abort();

        let v = view.lock().unwrap();
        assert_eq!(v.messages.len(), 1);
        assert_eq!(v.messages[0].id, signal.id);
    }
}
