//! Uploaded media: where files are written and how they are addressed.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use image::ImageFormat;
use tokio::fs;
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::error::AppError;

/// Directory (relative to the media root) holding profile pictures.
pub const PROFILE_PICS_DIR: &str = "profile_pics";

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Storage backend for uploaded files. Paths are always relative to the backend's root.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Writes `content` at `path`, creating parent directories as needed.
    async fn save(&self, path: &str, content: &[u8]) -> Result<(), AppError>;

    /// Removes the file at `path`. A file that is already gone is not an error.
    async fn delete(&self, path: &str) -> Result<(), AppError>;

    /// Public URL under which `path` is served.
    fn url(&self, path: &str) -> String;
}

/// Stores media on the local filesystem below `root`.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.root.clone(), config.url.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(AppError::InternalServerError(format!(
                "refusing media path outside the root: {:?}",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn save(&self, path: &str, content: &[u8]) -> Result<(), AppError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, content).await?;
        log::debug!("stored {} bytes at {}", content.len(), full.display());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Checks that `bytes` decode as an image and returns the file extension for its format.
/// Failures are reported against the `profile_picture` field.
pub fn validate_image(bytes: &[u8]) -> Result<&'static str, AppError> {
    if bytes.is_empty() {
        return Err(AppError::field("profile_picture", "The submitted file is empty."));
    }
    let format = image::guess_format(bytes).map_err(|_| AppError::field("profile_picture", INVALID_IMAGE))?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|_| AppError::field("profile_picture", INVALID_IMAGE))?;
    Ok(extension_for(format))
}

fn extension_for(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

/// Fresh storage path for a profile picture of `user_id`.
pub fn profile_picture_path(user_id: i32, extension: &str) -> String {
    format!("{}/{}-{}.{}", PROFILE_PICS_DIR, user_id, Uuid::new_v4().simple(), extension)
}
