use log::{debug, info};
use rand::Rng;
use thiserror::Error;

use crate::models::Room;
use crate::store::Store;

/// No `0/O` or `1/I`: codes get read aloud and retyped.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 6;

const CODE_RETRY_LIMIT: usize = 16;

/// Hard, terminal-for-this-attempt rejections. Anything transient (a failed
/// store read) is reported separately and never lands here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("Room not found")]
    RoomNotFound,
    #[error("You are banned from this room")]
    Banned,
    #[error("Room is locked")]
    Locked,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Negotiation {
    Accepted(Room),
    Rejected(RejectReason),
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Decides whether `fingerprint` may enter the room behind `code`. Every
/// check reads the store fresh: bans and locks can change between attempts,
/// so nothing is cached across negotiations.
///
/// Order matters. The ban check runs before the lock check so a banned
/// identity is told it is banned, not locked out; the membership check runs
/// before the lock check so a lock enabled mid-session never evicts someone
/// who already joined.
pub async fn negotiate(
    store: &Store,
    code: &str,
    fingerprint: &str,
) -> anyhow::Result<Negotiation> {
    let code = normalize_code(code);

    let Some(room) = store.get_room_by_code(&code).await? else {
        debug!("negotiation for {}: no such room", code);
        return Ok(Negotiation::Rejected(RejectReason::RoomNotFound));
    };

    if store.ban_exists(&room.id, fingerprint).await? {
        debug!("negotiation for {}: fingerprint is banned", code);
        return Ok(Negotiation::Rejected(RejectReason::Banned));
    }

    let existing = store.get_live_participant(&room.id, fingerprint).await?;

    if room.is_locked && existing.is_none() && room.host_fingerprint != fingerprint {
        debug!("negotiation for {}: room locked to newcomers", code);
        return Ok(Negotiation::Rejected(RejectReason::Locked));
    }

    Ok(Negotiation::Accepted(room))
}

/// Creates a room under a fresh code; the creator becomes its host and
/// holds moderation authority for the room's lifetime.
pub async fn create_room(store: &Store, name: &str, host_fingerprint: &str) -> anyhow::Result<Room> {
    for _ in 0..CODE_RETRY_LIMIT {
        let code = generate_room_code();
        if store.room_code_exists(&code).await? {
            continue;
        }
        match store.add_room(&code, name, host_fingerprint).await {
            Ok(room) => {
                info!("created room {} ({})", room.code, room.id);
                return Ok(room);
            }
            // Unique-constraint race with another creator: try another code.
            Err(e) => {
                debug!("room code collision on insert: {}", e);
                continue;
            }
        }
    }
    anyhow::bail!("could not allocate an unused room code")
}
