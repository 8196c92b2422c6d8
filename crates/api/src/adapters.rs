//! Production implementations of the domain ports.

use std::path::{Path, PathBuf};

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
};
use async_trait::async_trait;
use domain::{AssetHost, AssetRef, DomainError, PasswordHasher, extract_public_id};

/// Argon2id password hashing with a random salt per hash.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> domain::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| {
                tracing::error!(error = %err, "password hashing failed");
                DomainError::infrastructure("Failed to hash password")
            })
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Asset host backed by a local directory served under `base_url`.
///
/// Uploading moves a file out of the staging directory into the asset
/// directory; paths outside staging are refused. The delivery URL has the
/// `…/upload/v{version}/{publicId}.{ext}` form the rest of the system expects
/// from a media host.
#[derive(Debug, Clone)]
pub struct LocalDirAssetHost {
    staging: PathBuf,
    dir: PathBuf,
    base_url: String,
}

impl LocalDirAssetHost {
    pub fn new(
        staging: impl Into<PathBuf>,
        dir: impl Into<PathBuf>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            staging: staging.into(),
            dir: dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolves `local_path` to a regular file inside the staging directory.
    async fn staged_file(&self, local_path: &str) -> Option<PathBuf> {
        let staging = tokio::fs::canonicalize(&self.staging).await.ok()?;
        let source = tokio::fs::canonicalize(local_path).await.ok()?;
        if !source.starts_with(&staging) {
            tracing::warn!(path = %local_path, "refusing to upload a file outside staging");
            return None;
        }
        let meta = tokio::fs::metadata(&source).await.ok()?;
        meta.is_file().then_some(source)
    }

    fn stored_name(local: &Path) -> Option<String> {
        let stem = local.file_stem()?.to_str()?;
        let id = uuid::Uuid::new_v4().simple();
        Some(match local.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}-{id}.{}", ext.to_ascii_lowercase()),
            None => format!("{stem}-{id}"),
        })
    }
}

#[async_trait]
impl AssetHost for LocalDirAssetHost {
    #[tracing::instrument(skip(self))]
    async fn upload(&self, local_path: &str) -> Option<AssetRef> {
        let source = self.staged_file(local_path).await?;
        let name = Self::stored_name(&source)?;

        if let Err(err) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::warn!(error = %err, dir = %self.dir.display(), "cannot create asset directory");
            return None;
        }
        let copied = tokio::fs::copy(&source, self.dir.join(&name)).await;
        // The staged file is consumed whether or not the copy worked.
        let _ = tokio::fs::remove_file(&source).await;
        if let Err(err) = copied {
            tracing::warn!(error = %err, "asset upload failed");
            return None;
        }

        let version = chrono::Utc::now().timestamp();
        let url = format!("{}/upload/v{version}/{name}", self.base_url);
        let public_id = extract_public_id(&url)?;
        Some(AssetRef {
            url,
            public_id,
            duration: None,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, url: &str) -> bool {
        if !url.starts_with(&self.base_url) || extract_public_id(url).is_none() {
            return false;
        }
        let Some(name) = url.rsplit('/').next() else {
            return false;
        };
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "asset delete failed");
                false
            }
        }
    }
}
