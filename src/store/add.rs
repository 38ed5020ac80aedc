use chrono::Utc;
use uuid::Uuid;

use super::{Store, StoreEvent};
use crate::models::{Message, MessageBody, Participant, Room};

impl Store {
    pub async fn add_room(
        &self,
        code: &str,
        name: &str,
        host_fingerprint: &str,
    ) -> anyhow::Result<Room> {
        let now = Utc::now().timestamp_millis();
        let room = Room {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            host_fingerprint: host_fingerprint.to_string(),
            is_locked: false,
            created_at: now,
            last_activity_at: now,
        };

        sqlx::query(
            "INSERT INTO rooms (id, code, name, host_fingerprint, is_locked, created_at, last_activity_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&room.id)
        .bind(&room.code)
        .bind(&room.name)
        .bind(&room.host_fingerprint)
        .bind(room.is_locked)
        .bind(room.created_at)
        .bind(room.last_activity_at)
        .execute(&self.pool)
        .await?;

        Ok(room)
    }

    pub async fn add_participant(
        &self,
        room_id: &str,
        username: &str,
        fingerprint: &str,
    ) -> anyhow::Result<Participant> {
        let participant = Participant {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            username: username.to_string(),
            fingerprint: fingerprint.to_string(),
            is_muted: false,
            is_banned: false,
            joined_at: Utc::now().timestamp_millis(),
        };

        sqlx::query(
            "INSERT INTO room_participants (id, room_id, username, fingerprint, is_muted, is_banned, joined_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&participant.id)
        .bind(&participant.room_id)
        .bind(&participant.username)
        .bind(&participant.fingerprint)
        .bind(participant.is_muted)
        .bind(participant.is_banned)
        .bind(participant.joined_at)
        .execute(&self.pool)
        .await?;

        self.publish(StoreEvent::ParticipantInserted {
            room_id: room_id.to_string(),
        });
        Ok(participant)
    }

    pub async fn add_message(&self, message: &Message) -> anyhow::Result<()> {
        let (content, reply_to_id, file_url, file_name, file_type) = match &message.body {
            MessageBody::Text {
                content,
                reply_to_id,
            } => (
                Some(content.as_str()),
                reply_to_id.as_deref(),
                None,
                None,
                None,
            ),
            MessageBody::File {
                content,
                file_url,
                file_name,
                file_type,
            } => (
                Some(content.as_str()),
                None,
                Some(file_url.as_str()),
                Some(file_name.as_str()),
                file_type.as_deref(),
            ),
            MessageBody::System { content } => (Some(content.as_str()), None, None, None, None),
        };

        sqlx::query(
            "INSERT INTO messages
             (id, room_id, participant_id, username, content, message_type, reply_to_id, file_url, file_name, file_type, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.room_id)
        .bind(&message.participant_id)
        .bind(&message.username)
        .bind(content)
        .bind(message.kind())
        .bind(reply_to_id)
        .bind(file_url)
        .bind(file_name)
        .bind(file_type)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        self.publish(StoreEvent::MessageInserted(message.clone()));
        Ok(())
    }

    /// Append-only; inserting the same (room, fingerprint) twice is fine.
    pub async fn add_ban(&self, room_id: &str, fingerprint: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO banned_fingerprints (room_id, fingerprint) VALUES (?, ?)",
        )
        .bind(room_id)
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
