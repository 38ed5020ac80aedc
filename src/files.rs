use std::path::PathBuf;

use async_trait::async_trait;
use log::info;

/// Extensions accepted for upload. Checked locally before any store or blob
/// interaction.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "java", "c", "py", "cpp", "zip", "pdf", "jpg", "jpeg", "png", "gif", "webp",
];

/// True only for a bare file name: no separators, no parent or current
/// directory components. Upload paths are built from caller-supplied names,
/// so anything else must be refused before it reaches the blob store.
pub fn is_bare_file_name(file_name: &str) -> bool {
    if file_name.is_empty() || file_name.contains(['/', '\\']) {
        return false;
    }
    std::path::Path::new(file_name).file_name() == Some(std::ffi::OsStr::new(file_name))
}

pub fn file_extension(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

pub fn extension_allowed(file_name: &str) -> bool {
    match file_extension(file_name) {
        Some(ext) => ALLOWED_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

pub fn guess_file_type(file_name: &str) -> Option<String> {
    mime_guess::from_path(file_name).first().map(|m| m.to_string())
}

/// Opaque binary storage collaborator: write bytes under a path, mint a
/// public URL for it.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8]) -> anyhow::Result<()>;
    fn public_url(&self, path: &str) -> String;
}

/// Filesystem-backed blob store serving out of an uploads directory behind
/// some public base URL.
pub struct FsBlobStore {
    root: PathBuf,
    base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let rel = std::path::Path::new(path);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            anyhow::bail!("blob path '{}' escapes the uploads root", path);
        }
        let full = self.root.join(rel);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        info!("stored blob {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}
