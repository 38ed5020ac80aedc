use super::Store;
use crate::models::{Message, MessageRow, Participant, Room};

impl Store {
    pub async fn get_room_by_code(&self, code: &str) -> anyhow::Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(room)
    }

    pub async fn get_room(&self, room_id: &str) -> anyhow::Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(room)
    }

    /// The live (non-banned) participant row for this fingerprint, if any.
    pub async fn get_live_participant(
        &self,
        room_id: &str,
        fingerprint: &str,
    ) -> anyhow::Result<Option<Participant>> {
        let participant = sqlx::query_as::<_, Participant>(
            "SELECT * FROM room_participants
             WHERE room_id = ? AND fingerprint = ? AND is_banned = 0",
        )
        .bind(room_id)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participant)
    }

    pub async fn get_participant(&self, participant_id: &str) -> anyhow::Result<Option<Participant>> {
        let participant =
            sqlx::query_as::<_, Participant>("SELECT * FROM room_participants WHERE id = ?")
                .bind(participant_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(participant)
    }

    pub async fn get_live_participants(&self, room_id: &str) -> anyhow::Result<Vec<Participant>> {
        let participants = sqlx::query_as::<_, Participant>(
            "SELECT * FROM room_participants
             WHERE room_id = ? AND is_banned = 0 ORDER BY joined_at, rowid",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(participants)
    }

    pub async fn count_live_participants(&self, room_id: &str) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM room_participants WHERE room_id = ? AND is_banned = 0",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn get_messages(&self, room_id: &str) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages WHERE room_id = ? ORDER BY created_at, rowid",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Message::try_from).collect()
    }

    pub async fn get_message(&self, message_id: &str) -> anyhow::Result<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = ?")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Message::try_from).transpose()
    }

    pub async fn get_rooms_created_before(&self, cutoff: i64) -> anyhow::Result<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE created_at < ?")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rooms)
    }
}
