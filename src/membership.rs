use log::{debug, info};

use crate::models::{Message, Participant, Room};
use crate::store::Store;

/// Finds or creates the participant row for (room, fingerprint).
///
/// Rejoining reuses the existing live row; a changed display name is written
/// in place without re-announcing. Only a genuinely new participant gets a
/// join system message. Two concurrent first joins for the same fingerprint
/// are collapsed by the store's unique index on live (room_id, fingerprint)
/// rows, not by any locking here.
pub async fn ensure_participant(
    store: &Store,
    room: &Room,
    fingerprint: &str,
    username: &str,
) -> anyhow::Result<Participant> {
    if let Some(mut existing) = store.get_live_participant(&room.id, fingerprint).await? {
        if existing.username != username {
            debug!(
                "renaming participant {} from '{}' to '{}'",
                existing.id, existing.username, username
            );
            store
                .change_username(&existing.id, &room.id, username)
                .await?;
            existing.username = username.to_string();
        }
        return Ok(existing);
    }

    let participant = store.add_participant(&room.id, username, fingerprint).await?;
    info!("{} joined room {}", username, room.code);

    let announcement = Message::system(
        &room.id,
        Some(participant.id.clone()),
        username,
        format!("{} joined the room", username),
    );
    store.add_message(&announcement).await?;

    Ok(participant)
}
