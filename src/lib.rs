pub mod access;
pub mod db;
pub mod files;
pub mod identity;
pub mod membership;
pub mod models;
pub mod moderation;
pub mod reconciler;
pub mod session;
pub mod store;
pub mod sweep;

pub use access::{create_room, negotiate, Negotiation, RejectReason};
pub use files::{BlobStore, FsBlobStore};
pub use identity::{DeviceStorage, FingerprintProvider, IdentityResolver};
pub use models::{BanRecord, Message, MessageBody, Participant, Room};
pub use reconciler::RoomView;
pub use session::{JoinError, PanicDetector, RoomSession, SendError, SessionContext, SessionState};
pub use store::{Store, StoreEvent};

#[cfg(test)]
pub(crate) mod testutil {
    use crate::db;
    use crate::store::Store;

    pub async fn store() -> Store {
        let pool = db::memory_db().await.expect("in-memory db");
        db::init_schema(&pool).await.expect("schema");
        Store::new(pool)
    }
}
