use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{info, warn};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::access::{self, Negotiation, RejectReason};
use crate::files::{self, BlobStore};
use crate::identity::DeviceStorage;
use crate::membership;
use crate::models::{Message, Participant, Room};
use crate::moderation;
use crate::reconciler::{self, RoomView, SharedView};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Negotiating,
    Rejected(RejectReason),
    Joined,
    Leaving,
}

/// Everything a joined session knows about itself; passed explicitly to the
/// moderation functions instead of living in ambient state.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub room: Room,
    pub participant: Participant,
    pub fingerprint: String,
}

impl SessionContext {
    pub fn is_host(&self) -> bool {
        self.room.host_fingerprint == self.fingerprint
    }
}

#[derive(Error, Debug)]
pub enum JoinError {
    /// Structurally disallowed: blocking, terminal for this attempt.
    #[error("{0}")]
    Rejected(RejectReason),
    /// A request failed; the user is not locked out and may retry.
    #[error("join attempt failed, try again: {0}")]
    Transient(anyhow::Error),
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("no joined session")]
    NotJoined,
    #[error("you are muted in this room")]
    Muted,
    #[error("invalid file name: {0}")]
    InvalidName(String),
    #[error("file type not allowed: .{0}")]
    DisallowedType(String),
    #[error("upload failed: {0}")]
    Upload(anyhow::Error),
    #[error("message could not be sent: {0}")]
    Store(anyhow::Error),
}

/// One client's connection to one room: negotiates access, keeps the local
/// mirrors fed, and tears everything down on the way out.
///
/// States: Idle -> Negotiating -> (Rejected | Joined) -> Leaving -> Idle.
pub struct RoomSession {
    store: Store,
    blobs: Arc<dyn BlobStore>,
    state: SessionState,
    view: SharedView,
    ctx: Option<SessionContext>,
    feed: Option<JoinHandle<()>>,
}

impl RoomSession {
    pub fn new(store: Store, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            blobs,
            state: SessionState::Idle,
            view: Arc::new(Mutex::new(RoomView::default())),
            ctx: None,
            feed: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.ctx.as_ref()
    }

    pub fn is_host(&self) -> bool {
        self.ctx.as_ref().map(|c| c.is_host()).unwrap_or(false)
    }

    pub fn room(&self) -> Option<Room> {
        self.view.lock().unwrap().room.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.view.lock().unwrap().messages.clone()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.view.lock().unwrap().participants.clone()
    }

    /// Negotiates access and, on acceptance, enters the room: membership is
    /// ensured, the mirrors are seeded from the store, and only then does
    /// the feed subscription start. A rejection is terminal for this
    /// attempt; a transient failure resets to Idle so the caller can retry.
    pub async fn join(
        &mut self,
        code: &str,
        username: &str,
        fingerprint: &str,
    ) -> Result<(), JoinError> {
        // A session re-joining (room switch) must not keep the old feed.
        self.teardown_feed();
        self.view.lock().unwrap().clear();
        self.ctx = None;
        self.state = SessionState::Negotiating;

        let room = match access::negotiate(&self.store, code, fingerprint).await {
            Ok(Negotiation::Accepted(room)) => room,
            Ok(Negotiation::Rejected(reason)) => {
                self.state = SessionState::Rejected(reason.clone());
                return Err(JoinError::Rejected(reason));
            }
            Err(e) => {
                self.state = SessionState::Idle;
                return Err(JoinError::Transient(e));
            }
        };

        let participant =
            match membership::ensure_participant(&self.store, &room, fingerprint, username).await {
                Ok(p) => p,
                Err(e) => {
                    self.state = SessionState::Idle;
                    return Err(JoinError::Transient(e));
                }
            };

        if let Err(e) = reconciler::resync(&self.store, &room.id, &self.view).await {
            self.state = SessionState::Idle;
            return Err(JoinError::Transient(e));
        }

        let rx = self.store.subscribe();
        self.feed = Some(reconciler::spawn_feed(
            self.store.clone(),
            room.id.clone(),
            self.view.clone(),
            rx,
        ));

        self.ctx = Some(SessionContext {
            room,
            participant,
            fingerprint: fingerprint.to_string(),
        });
        self.state = SessionState::Joined;
        Ok(())
    }

    /// Sends a text message. The sender sees their own message arrive
    /// through the feed like everyone else; nothing is inserted into the
    /// mirrors here.
    pub async fn send_message(
        &self,
        content: String,
        reply_to_id: Option<String>,
    ) -> Result<(), SendError> {
        let ctx = self.ctx.as_ref().ok_or(SendError::NotJoined)?;
        let me = self.own_row(ctx);
        if me.is_muted {
            return Err(SendError::Muted);
        }

        let message = Message::text(&ctx.room.id, &me, content, reply_to_id);
        self.store
            .add_message(&message)
            .await
            .map_err(SendError::Store)?;

        if let Err(e) = self.store.touch_room_activity(&ctx.room.id).await {
            warn!("could not bump room activity: {}", e);
        }
        Ok(())
    }

    /// Validates, uploads, and announces a file. Type rejection happens
    /// locally before any store or blob traffic.
    pub async fn send_file(&self, file_name: &str, bytes: &[u8]) -> Result<(), SendError> {
        let ctx = self.ctx.as_ref().ok_or(SendError::NotJoined)?;
        let me = self.own_row(ctx);
        if me.is_muted {
            return Err(SendError::Muted);
        }

        if !files::is_bare_file_name(file_name) {
            return Err(SendError::InvalidName(file_name.to_string()));
        }
        if !files::extension_allowed(file_name) {
            return Err(SendError::DisallowedType(
                files::file_extension(file_name).unwrap_or_default(),
            ));
        }

        let path = format!(
            "{}/{}-{}",
            ctx.room.id,
            Utc::now().timestamp_millis(),
            file_name
        );
        self.blobs
            .upload(&path, bytes)
            .await
            .map_err(SendError::Upload)?;
        let url = self.blobs.public_url(&path);

        let message = Message::file(
            &ctx.room.id,
            &me,
            url,
            file_name.to_string(),
            files::guess_file_type(file_name),
        );
        self.store
            .add_message(&message)
            .await
            .map_err(SendError::Store)?;

        if let Err(e) = self.store.touch_room_activity(&ctx.room.id).await {
            warn!("could not bump room activity: {}", e);
        }
        Ok(())
    }

    pub async fn toggle_lock(&self) -> anyhow::Result<()> {
        match &self.ctx {
            Some(ctx) => moderation::toggle_lock(&self.store, ctx).await,
            None => Ok(()),
        }
    }

    pub async fn mute_user(&self, participant_id: &str) -> anyhow::Result<()> {
        match &self.ctx {
            Some(ctx) => moderation::mute_user(&self.store, ctx, participant_id).await,
            None => Ok(()),
        }
    }

    pub async fn kick_user(&self, participant_id: &str, ban: bool) -> anyhow::Result<()> {
        match &self.ctx {
            Some(ctx) => moderation::kick_user(&self.store, ctx, participant_id, ban).await,
            None => Ok(()),
        }
    }

    pub async fn delete_message(&self, message_id: &str) -> anyhow::Result<()> {
        match &self.ctx {
            Some(ctx) => moderation::delete_message(&self.store, ctx, message_id).await,
            None => Ok(()),
        }
    }

    /// Leaves the room. Mirrors are cleared before any network work so no
    /// stale joined-room state is visible during teardown, and every store
    /// failure past that point is swallowed: teardown must not get stuck.
    pub async fn leave(&mut self) {
        let ctx = self.ctx.take();
        self.state = SessionState::Leaving;
        self.view.lock().unwrap().clear();
        self.teardown_feed();

        if let Some(ctx) = ctx {
            let goodbye = Message::system(
                &ctx.room.id,
                None,
                "System",
                format!("{} left the room", ctx.participant.username),
            );
            if let Err(e) = self.store.add_message(&goodbye).await {
                warn!("leave announcement failed: {}", e);
            }

            if let Err(e) = self
                .store
                .remove_participant(&ctx.participant.id, &ctx.room.id)
                .await
            {
                warn!("could not remove own participant row: {}", e);
            }

            match self.store.count_live_participants(&ctx.room.id).await {
                Ok(0) => match self.store.remove_room_messages(&ctx.room.id).await {
                    Ok(n) => info!("last participant left {}, purged {} messages", ctx.room.code, n),
                    Err(e) => warn!("message purge for {} failed: {}", ctx.room.code, e),
                },
                Ok(_) => {}
                Err(e) => warn!("could not count remaining participants: {}", e),
            }
        }

        self.state = SessionState::Idle;
    }

    /// Duress exit: leave immediately, then wipe everything persisted
    /// locally (cached identity, saved username). Unconfirmed and
    /// irreversible by design.
    pub async fn panic_close(&mut self, storage: &DeviceStorage) {
        self.leave().await;
        storage.clear();
        info!("panic close completed, local state wiped");
    }

    /// Current own row as the feed last saw it; falls back to the join-time
    /// snapshot if the mirror has not caught up yet.
    fn own_row(&self, ctx: &SessionContext) -> Participant {
        self.view
            .lock()
            .unwrap()
            .participants
            .iter()
            .find(|p| p.id == ctx.participant.id)
            .cloned()
            .unwrap_or_else(|| ctx.participant.clone())
    }

    fn teardown_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.teardown_feed();
    }
}

/// Recognizes the rapid double-press that triggers a panic close.
pub struct PanicDetector {
    window: Duration,
    last_press: Option<Instant>,
}

impl Default for PanicDetector {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl PanicDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_press: None,
        }
    }

    /// Returns true when this press is the second within the window.
    pub fn register_press(&mut self) -> bool {
        self.register_press_at(Instant::now())
    }

    fn register_press_at(&mut self, at: Instant) -> bool {
        match self.last_press {
            Some(prev) if at.duration_since(prev) <= self.window => {
                self.last_press = None;
                true
            }
            _ => {
                self.last_press = Some(at);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_press_within_window_triggers() {
        let mut detector = PanicDetector::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(!detector.register_press_at(t0));
        assert!(detector.register_press_at(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn slow_presses_do_not_trigger() {
        let mut detector = PanicDetector::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(!detector.register_press_at(t0));
        assert!(!detector.register_press_at(t0 + Duration::from_millis(800)));
        // The late press restarts the window.
        assert!(detector.register_press_at(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn trigger_resets_the_detector() {
        let mut detector = PanicDetector::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(!detector.register_press_at(t0));
        assert!(detector.register_press_at(t0 + Duration::from_millis(100)));
        // A third press starts over rather than firing again.
        assert!(!detector.register_press_at(t0 + Duration::from_millis(150)));
    }
}
