//! Downloads remote images into the local media directory.

use super::error::AssetError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MAX_ASSET_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    ArtistImage,
    AlbumCover,
}

impl AssetKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            AssetKind::ArtistImage => "artist",
            AssetKind::AlbumCover => "album",
        }
    }
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Fetch `url` and store it locally. Returns the stored path relative to
    /// the media root.
    async fn store_from_url(
        &self,
        url: &str,
        kind: AssetKind,
        entity_id: &str,
    ) -> Result<String, AssetError>;
}

/// Stores assets under `<media_root>/images/<kind>/<sha256(url)>.<ext>`.
///
/// Naming by URL hash makes re-downloading the same image idempotent.
pub struct FileSystemAssetStore {
    client: Client,
    media_root: PathBuf,
    max_bytes: usize,
}

impl FileSystemAssetStore {
    pub fn new(client: Client, media_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            media_root: media_root.into(),
            max_bytes: MAX_ASSET_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AssetError::Status(response.status().as_u16()));
        }
        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(AssetError::TooLarge(self.max_bytes));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(AssetError::TooLarge(self.max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

pub(crate) fn asset_file_name(url: &str, extension: &str) -> String {
    format!("{:x}.{}", Sha256::digest(url.as_bytes()), extension)
}

/// Sniff the content and return the file extension for a supported image.
pub(crate) fn image_extension(bytes: &[u8]) -> Result<&'static str, AssetError> {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(kind.extension()),
        Some(kind) => Err(AssetError::NotAnImage(kind.mime_type().to_string())),
        None => Err(AssetError::NotAnImage("unknown".to_string())),
    }
}

#[async_trait]
impl AssetStore for FileSystemAssetStore {
    async fn store_from_url(
        &self,
        url: &str,
        kind: AssetKind,
        entity_id: &str,
    ) -> Result<String, AssetError> {
        debug!("Downloading {} for {}", url, entity_id);
        let bytes = self.download(url).await?;
        let extension = image_extension(&bytes)?;

        let relative_dir = Path::new("images").join(kind.dir_name());
        let dir = self.media_root.join(&relative_dir);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = asset_file_name(url, extension);
        let final_path = dir.join(&file_name);
        let temp_path = dir.join(format!(".{}.part", file_name));

        // Write then rename so readers never see a partial file.
        tokio::fs::write(&temp_path, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let relative = relative_dir.join(&file_name);
        info!(
            "Stored {} ({} bytes) for {} at {:?}",
            url,
            bytes.len(),
            entity_id,
            relative
        );
        Ok(relative.to_string_lossy().replace('\\', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    #[test]
    fn test_png_is_accepted() {
        assert_eq!(image_extension(PNG_HEADER).unwrap(), "png");
    }

    #[test]
    fn test_html_is_rejected() {
        let err = image_extension(b"<!DOCTYPE html><html></html>").unwrap_err();
        assert!(matches!(err, AssetError::NotAnImage(_)));
    }

    #[test]
    fn test_file_name_is_stable_per_url() {
        let a = asset_file_name("https://img.example/a.jpg", "jpg");
        let b = asset_file_name("https://img.example/a.jpg", "jpg");
        let c = asset_file_name("https://img.example/b.jpg", "jpg");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64 + 4);
    }

    #[tokio::test]
    async fn test_unreachable_url_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let store = FileSystemAssetStore::new(Client::new(), temp_dir.path());
        let result = store
            .store_from_url("http://127.0.0.1:9/nothing.jpg", AssetKind::AlbumCover, "a")
            .await;
        assert!(result.is_err());
    }
}
