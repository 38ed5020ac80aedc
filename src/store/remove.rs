use super::{Store, StoreEvent};

impl Store {
    pub async fn remove_message(&self, message_id: &str, room_id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        self.publish(StoreEvent::MessageDeleted {
            room_id: room_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    pub async fn remove_participant(&self, participant_id: &str, room_id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM room_participants WHERE id = ?")
            .bind(participant_id)
            .execute(&self.pool)
            .await?;

        self.publish(StoreEvent::ParticipantDeleted {
            room_id: room_id.to_string(),
        });
        Ok(())
    }

    /// Reclaims the history when the last participant walks out; the room
    /// row itself stays until the TTL sweep.
    pub async fn remove_room_messages(&self, room_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE room_id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Full teardown for the TTL sweep, children before parent so an
    /// interrupted sweep leaves no orphaned rows.
    pub async fn remove_room(&self, room_id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM room_participants WHERE room_id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM messages WHERE room_id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM banned_fingerprints WHERE room_id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
