use chrono::Utc;

use super::{Store, StoreEvent};

impl Store {
    pub async fn change_username(
        &self,
        participant_id: &str,
        room_id: &str,
        new_username: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE room_participants SET username = ? WHERE id = ?")
            .bind(new_username)
            .bind(participant_id)
            .execute(&self.pool)
            .await?;

        self.publish(StoreEvent::ParticipantUpdated {
            room_id: room_id.to_string(),
        });
        Ok(())
    }

    pub async fn change_muted(
        &self,
        participant_id: &str,
        room_id: &str,
        is_muted: bool,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE room_participants SET is_muted = ? WHERE id = ?")
            .bind(is_muted)
            .bind(participant_id)
            .execute(&self.pool)
            .await?;

        self.publish(StoreEvent::ParticipantUpdated {
            room_id: room_id.to_string(),
        });
        Ok(())
    }

    /// Soft removal: the row stays so message attribution survives.
    pub async fn change_banned(
        &self,
        participant_id: &str,
        room_id: &str,
        is_banned: bool,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE room_participants SET is_banned = ? WHERE id = ?")
            .bind(is_banned)
            .bind(participant_id)
            .execute(&self.pool)
            .await?;

        self.publish(StoreEvent::ParticipantUpdated {
            room_id: room_id.to_string(),
        });
        Ok(())
    }

    pub async fn change_locked(&self, room_id: &str, is_locked: bool) -> anyhow::Result<()> {
        sqlx::query("UPDATE rooms SET is_locked = ? WHERE id = ?")
            .bind(is_locked)
            .bind(room_id)
            .execute(&self.pool)
            .await?;

        if let Some(room) = self.get_room(room_id).await? {
            self.publish(StoreEvent::RoomUpdated(room));
        }
        Ok(())
    }

    pub async fn touch_room_activity(&self, room_id: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE rooms SET last_activity_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp_millis())
            .bind(room_id)
            .execute(&self.pool)
            .await?;

        if let Some(room) = self.get_room(room_id).await? {
            self.publish(StoreEvent::RoomUpdated(room));
        }
        Ok(())
    }
}
