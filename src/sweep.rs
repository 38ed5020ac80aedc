use std::time::Duration;

use chrono::Utc;
use log::{error, info};

use crate::store::Store;

pub const DEFAULT_TTL_HOURS: i64 = 24;
pub const DEFAULT_INTERVAL_SECS: u64 = 60 * 60;

/// Deletes every room older than `ttl_hours` together with its
/// participants, messages, and ban records, children before parent.
/// Returns how many rooms were evicted.
pub async fn sweep_stale_rooms(store: &Store, ttl_hours: i64) -> anyhow::Result<usize> {
    let cutoff = Utc::now().timestamp_millis() - ttl_hours * 60 * 60 * 1000;
    let stale = store.get_rooms_created_before(cutoff).await?;

    for room in &stale {
        store.remove_room(&room.id).await?;
        info!("swept stale room {} ({})", room.code, room.id);
    }
    Ok(stale.len())
}

/// Runs the sweep once immediately, then on a fixed interval. Sweep errors
/// are logged and the loop keeps going.
pub async fn run_sweeper(store: Store, ttl_hours: i64, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        match sweep_stale_rooms(&store, ttl_hours).await {
            Ok(0) => {}
            Ok(n) => info!("sweep evicted {} stale room(s)", n),
            Err(e) => error!("sweep failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use crate::testutil;

    /// Backdates a room so the sweep sees it as expired.
    async fn age_room(store: &Store, room_id: &str, hours: i64) {
        let created = Utc::now().timestamp_millis() - hours * 60 * 60 * 1000;
        sqlx::query("UPDATE rooms SET created_at = ? WHERE id = ?")
            .bind(created)
            .bind(room_id)
            .execute(&store.pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn expired_room_is_fully_removed() {
        let store = testutil::store().await;
        let room = store.add_room("AB3D9K", "old", "H1").await.unwrap();
        store.add_participant(&room.id, "alice", "U1").await.unwrap();
        store.add_ban(&room.id, "U2").await.unwrap();
        let msg = Message::system(&room.id, None, "System", "history".into());
        store.add_message(&msg).await.unwrap();
        age_room(&store, &room.id, 25).await;

        let swept = sweep_stale_rooms(&store, 24).await.unwrap();
        assert_eq!(swept, 1);

        assert!(store.get_room_by_code("AB3D9K").await.unwrap().is_none());
        assert!(store.get_live_participants(&room.id).await.unwrap().is_empty());
        assert!(store.get_messages(&room.id).await.unwrap().is_empty());
        assert!(!store.ban_exists(&room.id, "U2").await.unwrap());
    }

    #[tokio::test]
    async fn young_room_survives_the_sweep() {
        let store = testutil::store().await;
        let room = store.add_room("AB3D9K", "fresh", "H1").await.unwrap();
        age_room(&store, &room.id, 23).await;

        let swept = sweep_stale_rooms(&store, 24).await.unwrap();
        assert_eq!(swept, 0);
        assert!(store.get_room_by_code("AB3D9K").await.unwrap().is_some());
    }
}
