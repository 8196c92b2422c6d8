//! Collaborators the services depend on but do not implement.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::AssetRef;

/// Third-party host for media assets.
///
/// Failures are reported as `None`/`false`, never as errors; callers decide
/// whether a failed upload aborts the operation.
#[async_trait]
pub trait AssetHost: Send + Sync {
    /// Uploads the already-staged file at `local_path`.
    async fn upload(&self, local_path: &str) -> Option<AssetRef>;

    /// Deletes the asset delivered at `url`.
    async fn delete(&self, url: &str) -> bool;
}

/// One-way credential hashing.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;

    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Derives the host-side identifier from a delivery URL.
///
/// `https://host/image/upload/v1712/folder/name.png` becomes `folder/name`.
/// Returns `None` when the URL has no `upload/` segment.
pub fn extract_public_id(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("upload/")?;

    let rest = match rest.split_once('/') {
        Some((version, tail))
            if version.len() > 1
                && version.starts_with('v')
                && version[1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            tail
        }
        _ => rest,
    };

    let id = match rest.rfind('.') {
        Some(dot) if !rest[dot..].contains('/') => &rest[..dot],
        _ => rest,
    };

    (!id.is_empty()).then(|| id.to_string())
}

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "webm", "mkv"];

/// Asset host keeping uploads in memory.
///
/// Paths are accepted as-is; nothing is read from disk.
#[derive(Clone, Default)]
pub struct InMemoryAssetHost {
    assets: Arc<RwLock<HashMap<String, AssetRef>>>,
    failing: bool,
    video_duration: f64,
}

impl InMemoryAssetHost {
    pub fn new() -> Self {
        Self {
            video_duration: 60.0,
            ..Self::default()
        }
    }

    /// A host on which every upload fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    /// Number of assets currently hosted.
    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assets.read().await.is_empty()
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.assets.read().await.contains_key(url)
    }
}

#[async_trait]
impl AssetHost for InMemoryAssetHost {
    async fn upload(&self, local_path: &str) -> Option<AssetRef> {
        if self.failing {
            return None;
        }
        let path = Path::new(local_path);
        let stem = path.file_stem()?.to_str()?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("bin");

        let public_id = format!("{}-{}", stem, uuid::Uuid::new_v4().simple());
        let url = format!("memory://assets/upload/v1/{public_id}.{extension}");
        let duration = VIDEO_EXTENSIONS
            .contains(&extension)
            .then_some(self.video_duration);

        let asset = AssetRef {
            url: url.clone(),
            public_id,
            duration,
        };
        self.assets.write().await.insert(url, asset.clone());
        Some(asset)
    }

    async fn delete(&self, url: &str) -> bool {
        self.assets.write().await.remove(url).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_id_strips_version_and_extension() {
        assert_eq!(
            extract_public_id("https://res.host/demo/image/upload/v1712345/avatars/me.png"),
            Some("avatars/me".to_string())
        );
        assert_eq!(
            extract_public_id("https://res.host/demo/video/upload/clip.mp4"),
            Some("clip".to_string())
        );
        assert_eq!(extract_public_id("https://res.host/no-marker/clip.mp4"), None);
    }

    #[test]
    fn public_id_keeps_non_version_segments() {
        assert_eq!(
            extract_public_id("http://h/upload/videos/v2/file.webm"),
            Some("videos/v2/file".to_string())
        );
    }

    #[tokio::test]
    async fn in_memory_host_round_trips_assets() {
        let host = InMemoryAssetHost::new();

        let video = host.upload("/tmp/clip.mp4").await.unwrap();
        assert_eq!(video.duration, Some(60.0));
        let image = host.upload("/tmp/thumb.png").await.unwrap();
        assert_eq!(image.duration, None);
        assert_eq!(extract_public_id(&image.url), Some(image.public_id.clone()));

        assert!(host.delete(&video.url).await);
        assert!(!host.delete(&video.url).await);
        assert_eq!(host.len().await, 1);
    }

    #[tokio::test]
    async fn failing_host_rejects_uploads() {
        let host = InMemoryAssetHost::failing();
        assert!(host.upload("/tmp/clip.mp4").await.is_none());
    }
}
