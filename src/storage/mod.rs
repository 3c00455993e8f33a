//! Image hosting behind a single interface.

pub mod cloudinary;
pub mod imagekit;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub use cloudinary::CloudinaryStorage;
pub use imagekit::ImageKitStorage;

use crate::config::{ImageConfig, ImageStorageKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    pub storage_id: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{provider}: {message}")]
pub struct StorageError {
    pub provider: &'static str,
    pub code: Option<u16>,
    pub message: String,
}

impl StorageError {
    pub fn new(provider: &'static str, message: impl Into<String>) -> Self {
        Self {
            provider,
            code: None,
            message: message.into(),
        }
    }

    /// Maps a failed HTTP exchange to a readable message.
    pub fn from_status(provider: &'static str, status: u16, detail: &str) -> Self {
        let message = match status {
            413 => "File too large for upload".to_string(),
            400 => "Invalid file format or corrupted file".to_string(),
            _ if detail.is_empty() => format!("upload failed with status {status}"),
            _ => detail.to_string(),
        };
        Self {
            provider,
            code: Some(status),
            message,
        }
    }

    pub fn from_request(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::new(
                provider,
                "Upload timeout - file may be too large or connection slow",
            );
        }
        Self::new(provider, err.to_string())
    }
}

#[async_trait]
pub trait ImageStorage: Send + Sync {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        folder: &str,
    ) -> Result<UploadedImage, StorageError>;

    async fn delete(&self, storage_id: &str) -> Result<(), StorageError>;

    /// Uploads a spooled file. The local file is removed whether or not the
    /// upload succeeds.
    async fn upload_file(&self, path: &Path, folder: &str) -> Result<UploadedImage, StorageError> {
        let result = match tokio::fs::read(path).await {
            Ok(bytes) => {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                tracing::debug!(path = %path.display(), size = bytes.len(), folder, "uploading image");
                self.upload(bytes, &file_name, folder).await
            }
            Err(err) => Err(StorageError::new(
                "local",
                format!("File not found: {} ({err})", path.display()),
            )),
        };

        if let Err(err) = tokio::fs::remove_file(path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "temp file cleanup failed");
            }
        }

        match &result {
            Ok(image) => tracing::info!(storage_id = %image.storage_id, folder, "image uploaded"),
            Err(err) => tracing::error!(error = %err, folder, "image upload failed"),
        }
        result
    }
}

/// Writes incoming bytes under `dir` with a unique name keeping the extension.
pub async fn spool(dir: &Path, original_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");
    let path = dir.join(format!("{}.{ext}", Uuid::new_v4()));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Deletes a stored image, logging instead of failing.
pub async fn delete_quietly(storage: &dyn ImageStorage, storage_id: &str) {
    if let Err(err) = storage.delete(storage_id).await {
        tracing::warn!(storage_id, error = %err, "image delete failed");
    }
}

pub fn build_storage(config: &ImageConfig) -> anyhow::Result<Arc<dyn ImageStorage>> {
    let storage: Arc<dyn ImageStorage> = match config.storage {
        ImageStorageKind::Cloudinary => Arc::new(CloudinaryStorage::new(
            config
                .cloudinary_cloud_name
                .clone()
                .context("CLOUDINARY_CLOUD_NAME is not set")?,
            config
                .cloudinary_api_key
                .clone()
                .context("CLOUDINARY_API_KEY is not set")?,
            config
                .cloudinary_api_secret
                .clone()
                .context("CLOUDINARY_API_SECRET is not set")?,
            config.timeout,
        )?),
        ImageStorageKind::ImageKit => Arc::new(ImageKitStorage::new(
            config
                .imagekit_private_key
                .clone()
                .context("IMAGEKIT_PRIVATE_KEY is not set")?,
            config.timeout,
        )?),
    };
    tracing::info!(storage = ?config.storage, "image storage ready");
    Ok(storage)
}
