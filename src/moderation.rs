use log::{info, warn};

use crate::models::Message;
use crate::session::SessionContext;
use crate::store::Store;

/// Moderation actions are dispatch-only: each returns once the store write
/// is issued, and the resulting state is observed back through the change
/// feed like any other client's mutation. A caller without authority gets a
/// logged no-op, never an error and never a store write.

pub async fn toggle_lock(store: &Store, ctx: &SessionContext) -> anyhow::Result<()> {
    if !ctx.is_host() {
        warn!("ignoring toggle_lock from non-host in room {}", ctx.room.code);
        return Ok(());
    }

    // Flip against the room's current state, not the caller's mirror.
    let Some(room) = store.get_room(&ctx.room.id).await? else {
        return Ok(());
    };
    store.change_locked(&room.id, !room.is_locked).await?;
    info!(
        "room {} {}",
        room.code,
        if room.is_locked { "unlocked" } else { "locked" }
    );
    Ok(())
}

pub async fn mute_user(
    store: &Store,
    ctx: &SessionContext,
    participant_id: &str,
) -> anyhow::Result<()> {
    if !ctx.is_host() {
        warn!("ignoring mute from non-host in room {}", ctx.room.code);
        return Ok(());
    }

    let Some(target) = store.get_participant(participant_id).await? else {
        return Ok(());
    };
    store
        .change_muted(&target.id, &target.room_id, !target.is_muted)
        .await?;
    info!(
        "{} {} in room {}",
        target.username,
        if target.is_muted { "unmuted" } else { "muted" },
        ctx.room.code
    );
    Ok(())
}

/// Soft-removes the target. With `ban`, the ban record is written before
/// the participant flag so the exclusion is durable even if a later step
/// fails mid-way.
pub async fn kick_user(
    store: &Store,
    ctx: &SessionContext,
    participant_id: &str,
    ban: bool,
) -> anyhow::Result<()> {
    if !ctx.is_host() {
        warn!("ignoring kick from non-host in room {}", ctx.room.code);
        return Ok(());
    }

    let Some(target) = store.get_participant(participant_id).await? else {
        return Ok(());
    };
    if target.fingerprint == ctx.room.host_fingerprint {
        warn!("host attempted to kick their own row in room {}", ctx.room.code);
        return Ok(());
    }

    if ban {
        store.add_ban(&ctx.room.id, &target.fingerprint).await?;
    }
    store.change_banned(&target.id, &ctx.room.id, true).await?;

    let announcement = Message::system(
        &ctx.room.id,
        None,
        "System",
        format!(
            "{} was {} from the room",
            target.username,
            if ban { "banned" } else { "kicked" }
        ),
    );
    store.add_message(&announcement).await?;
    info!(
        "{} {} from room {}",
        target.username,
        if ban { "banned" } else { "kicked" },
        ctx.room.code
    );
    Ok(())
}

/// Hard delete, allowed for the host or the message's owner; anyone else
/// gets a no-op. Propagation to other clients rides the change feed.
pub async fn delete_message(
    store: &Store,
    ctx: &SessionContext,
    message_id: &str,
) -> anyhow::Result<()> {
    let Some(message) = store.get_message(message_id).await? else {
        return Ok(());
    };

    let owns_it = message.participant_id.as_deref() == Some(ctx.participant.id.as_str());
    if !ctx.is_host() && !owns_it {
        warn!(
            "ignoring delete of foreign message {} in room {}",
            message_id, ctx.room.code
        );
        return Ok(());
    }

    store.remove_message(&message.id, &message.room_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{negotiate, Negotiation, RejectReason};
    use crate::testutil;

    async fn setup() -> (Store, SessionContext, SessionContext, crate::models::Participant) {
        let store = testutil::store().await;
        let room = store.add_room("AB3D9K", "room", "H1").await.unwrap();
        let host_row = store.add_participant(&room.id, "host", "H1").await.unwrap();
        let guest_row = store.add_participant(&room.id, "alice", "U1").await.unwrap();

        let host = SessionContext {
            room: room.clone(),
            participant: host_row,
            fingerprint: "H1".into(),
        };
        let guest = SessionContext {
            room,
            participant: guest_row.clone(),
            fingerprint: "U1".into(),
        };
        (store, host, guest, guest_row)
    }

    #[tokio::test]
    async fn non_host_actions_cause_no_store_mutation() {
        let (store, host, guest, _) = setup().await;
        let mut rx = store.subscribe();

        toggle_lock(&store, &guest).await.unwrap();
        mute_user(&store, &guest, &host.participant.id).await.unwrap();
        kick_user(&store, &guest, &host.participant.id, true).await.unwrap();

        // No change-feed events, and the rows are untouched.
        assert!(rx.try_recv().is_err());
        let room = store.get_room(&guest.room.id).await.unwrap().unwrap();
        assert!(!room.is_locked);
        let host_row = store.get_participant(&host.participant.id).await.unwrap().unwrap();
        assert!(!host_row.is_muted && !host_row.is_banned);
    }

    #[tokio::test]
    async fn host_toggles_lock_both_ways() {
        let (store, host, _, _) = setup().await;

        toggle_lock(&store, &host).await.unwrap();
        assert!(store.get_room(&host.room.id).await.unwrap().unwrap().is_locked);

        toggle_lock(&store, &host).await.unwrap();
        assert!(!store.get_room(&host.room.id).await.unwrap().unwrap().is_locked);
    }

    #[tokio::test]
    async fn host_mute_is_a_toggle() {
        let (store, host, _, guest_row) = setup().await;

        mute_user(&store, &host, &guest_row.id).await.unwrap();
        assert!(store.get_participant(&guest_row.id).await.unwrap().unwrap().is_muted);

        mute_user(&store, &host, &guest_row.id).await.unwrap();
        assert!(!store.get_participant(&guest_row.id).await.unwrap().unwrap().is_muted);
    }

    #[tokio::test]
    async fn kick_with_ban_writes_ban_flag_and_announcement() {
        let (store, host, _, guest_row) = setup().await;

        kick_user(&store, &host, &guest_row.id, true).await.unwrap();

        assert!(store.ban_exists(&host.room.id, "U1").await.unwrap());
        let row = store.get_participant(&guest_row.id).await.unwrap().unwrap();
        assert!(row.is_banned);

        let messages = store.get_messages(&host.room.id).await.unwrap();
        let last = messages.last().unwrap();
        assert!(last.is_system());
        assert_eq!(last.content(), "alice was banned from the room");
        assert_eq!(last.username, "System");
        assert!(last.participant_id.is_none());
    }

    #[tokio::test]
    async fn plain_kick_leaves_no_ban_record() {
        let (store, host, _, guest_row) = setup().await;

        kick_user(&store, &host, &guest_row.id, false).await.unwrap();

        assert!(!store.ban_exists(&host.room.id, "U1").await.unwrap());
        assert!(store.get_participant(&guest_row.id).await.unwrap().unwrap().is_banned);
        let messages = store.get_messages(&host.room.id).await.unwrap();
        assert_eq!(messages.last().unwrap().content(), "alice was kicked from the room");
    }

    #[tokio::test]
    async fn ban_outlives_participant_row_deletion() {
        let (store, host, _, guest_row) = setup().await;

        kick_user(&store, &host, &guest_row.id, true).await.unwrap();
        store.remove_participant(&guest_row.id, &host.room.id).await.unwrap();

        let outcome = negotiate(&store, "AB3D9K", "U1").await.unwrap();
        assert_eq!(outcome, Negotiation::Rejected(RejectReason::Banned));
    }

    #[tokio::test]
    async fn host_cannot_kick_their_own_row() {
        let (store, host, _, _) = setup().await;

        kick_user(&store, &host, &host.participant.id, true).await.unwrap();

        let row = store.get_participant(&host.participant.id).await.unwrap().unwrap();
        assert!(!row.is_banned);
        assert!(!store.ban_exists(&host.room.id, "H1").await.unwrap());
    }

    #[tokio::test]
    async fn message_deletion_requires_host_or_ownership() {
        let (store, host, guest, guest_row) = setup().await;

        let own = Message::text(&host.room.id, &guest_row, "mine".into(), None);
        store.add_message(&own).await.unwrap();
        let hosts = Message::text(&host.room.id, &host.participant, "host's".into(), None);
        store.add_message(&hosts).await.unwrap();

        // Guest cannot delete someone else's message.
        delete_message(&store, &guest, &hosts.id).await.unwrap();
        assert!(store.get_message(&hosts.id).await.unwrap().is_some());

        // Guest can delete their own; host can delete anything.
        delete_message(&store, &guest, &own.id).await.unwrap();
        assert!(store.get_message(&own.id).await.unwrap().is_none());
        delete_message(&store, &host, &hosts.id).await.unwrap();
        assert!(store.get_message(&hosts.id).await.unwrap().is_none());
    }
}
