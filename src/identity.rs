use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, warn};
use rand::Rng;
use tokio::sync::Mutex;

pub const FINGERPRINT_KEY: &str = "shareroom_fingerprint";
pub const USERNAME_KEY: &str = "shareroom_username";

const FALLBACK_PREFIX: &str = "fallback_";
const FALLBACK_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque device fingerprinting collaborator. May be slow or fail; the
/// resolver masks both.
#[async_trait]
pub trait FingerprintProvider: Send + Sync {
    async fn get_identity(&self) -> anyhow::Result<String>;
}

/// Small file-per-key persisted state, standing in for the browser's local
/// storage. Values survive process restarts; panic close wipes them.
#[derive(Clone, Debug)]
pub struct DeviceStorage {
    dir: PathBuf,
}

impl DeviceStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let value = std::fs::read_to_string(self.dir.join(key)).ok()?;
        let value = value.trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    pub fn put(&self, key: &str, value: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(key), value)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.dir.join(key));
    }

    pub fn clear(&self) {
        self.remove(FINGERPRINT_KEY);
        self.remove(USERNAME_KEY);
    }
}

/// Resolves the durable per-device identity. Resolution never fails: if the
/// fingerprinting collaborator errors out, a random fallback token is minted
/// and persisted in its place.
pub struct IdentityResolver {
    storage: DeviceStorage,
    provider: Box<dyn FingerprintProvider>,
    cached: Mutex<Option<String>>,
}

impl IdentityResolver {
    pub fn new(storage: DeviceStorage, provider: Box<dyn FingerprintProvider>) -> Self {
        Self {
            storage,
            provider,
            cached: Mutex::new(None),
        }
    }

    pub async fn resolve(&self) -> String {
        let mut cached = self.cached.lock().await;
        if let Some(identity) = cached.as_ref() {
            return identity.clone();
        }

        if let Some(stored) = self.storage.get(FINGERPRINT_KEY) {
            debug!("reusing persisted fingerprint");
            *cached = Some(stored.clone());
            return stored;
        }

        let identity = match self.provider.get_identity().await {
            Ok(id) if !id.is_empty() => id,
            Ok(_) => {
                warn!("fingerprint provider returned an empty identity, using fallback");
                fallback_token()
            }
            Err(e) => {
                warn!("fingerprint provider failed ({}), using fallback", e);
                fallback_token()
            }
        };

        if let Err(e) = self.storage.put(FINGERPRINT_KEY, &identity) {
            warn!("could not persist fingerprint: {}", e);
        }
        *cached = Some(identity.clone());
        identity
    }
}

fn fallback_token() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..FALLBACK_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}{}", FALLBACK_PREFIX, suffix)
}
