//! Video publishing and maintenance.

use std::sync::Arc;

use common::DocumentId;
use doc_store::{Cascade, Changes, DocumentStore, WriteOptions, id_value};
use serde::Serialize;

use crate::error::{DomainError, Result};
use crate::model::{AssetRef, Video, WATCH_HISTORY_LIMIT, collections};
use crate::ports::AssetHost;
use crate::support::{self, ensure_owner, optional, required};

/// Command to publish a new video.
#[derive(Debug, Clone, Default)]
pub struct PublishVideo {
    pub title: String,
    pub description: String,
    pub video_file_path: String,
    pub thumbnail_path: String,
}

/// Partial update of a video's metadata.
#[derive(Debug, Clone, Default)]
pub struct UpdateVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_path: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewVideo<'a> {
    owner: DocumentId,
    video_file: &'a AssetRef,
    thumbnail: &'a AssetRef,
    title: &'a str,
    description: &'a str,
    duration: f64,
    views: i64,
    is_published: bool,
}

/// Everything that goes away with a video: its comments and their likes,
/// its own likes, and its place in playlists and watch histories.
pub fn video_cascade() -> Vec<Cascade> {
    vec![
        Cascade::delete(collections::COMMENTS, "video")
            .then(Cascade::delete(collections::LIKES, "comment")),
        Cascade::delete(collections::LIKES, "video"),
        Cascade::pull(collections::PLAYLISTS, "videos"),
        Cascade::pull(collections::ACCOUNTS, "watchHistory"),
    ]
}

/// Service for video lifecycle operations.
pub struct VideoService<S: DocumentStore> {
    store: S,
    assets: Arc<dyn AssetHost>,
}

impl<S: DocumentStore> VideoService<S> {
    pub fn new(store: S, assets: Arc<dyn AssetHost>) -> Self {
        Self { store, assets }
    }

    /// Uploads the media file and thumbnail and stores a published video.
    #[tracing::instrument(skip(self, cmd), fields(title = %cmd.title))]
    pub async fn publish(&self, owner: DocumentId, cmd: PublishVideo) -> Result<Video> {
        let title = required(&cmd.title, "Missing title")?;
        let description = required(&cmd.description, "Missing description")?;
        let video_file_path = required(&cmd.video_file_path, "Missing video file")?;
        let thumbnail_path = required(&cmd.thumbnail_path, "Missing thumbnail file")?;

        let upload_failed = || DomainError::infrastructure("Video upload failed");
        let video_file = self
            .assets
            .upload(&video_file_path)
            .await
            .ok_or_else(upload_failed)?;
        let thumbnail = match self.assets.upload(&thumbnail_path).await {
            Some(asset) => asset,
            None => {
                self.assets.delete(&video_file.url).await;
                return Err(upload_failed());
            }
        };

        let new = NewVideo {
            owner,
            video_file: &video_file,
            thumbnail: &thumbnail,
            title: &title,
            description: &description,
            duration: video_file.duration.unwrap_or(0.0),
            views: 0,
            is_published: true,
        };
        let video: Video =
            support::insert(&self.store, collections::VIDEOS, &new, WriteOptions::new()).await?;

        metrics::counter!("videos_published_total").increment(1);
        tracing::info!(video_id = %video.id, "video published");
        Ok(video)
    }

    pub async fn get(&self, video_id: DocumentId) -> Result<Video> {
        support::load(&self.store, collections::VIDEOS, video_id, "Video").await
    }

    /// Updates title, description and/or thumbnail. Owner only.
    #[tracing::instrument(skip(self, cmd))]
    pub async fn update(
        &self,
        caller: DocumentId,
        video_id: DocumentId,
        cmd: UpdateVideo,
    ) -> Result<Video> {
        let video = self.get(video_id).await?;
        ensure_owner(video.owner, caller, "You are not allowed to update this video")?;

        let title = optional(cmd.title.as_deref());
        let description = optional(cmd.description.as_deref());
        let thumbnail_path = optional(cmd.thumbnail_path.as_deref());
        if title.is_none() && description.is_none() && thumbnail_path.is_none() {
            return Err(DomainError::validation("Nothing to update"));
        }

        let mut changes = Changes::new();
        if let Some(title) = title {
            changes = changes.set("title", title);
        }
        if let Some(description) = description {
            changes = changes.set("description", description);
        }
        if let Some(path) = &thumbnail_path {
            let thumbnail = self
                .assets
                .upload(path)
                .await
                .ok_or_else(|| DomainError::infrastructure("Thumbnail upload failed"))?;
            changes = changes.set("thumbnail", serde_json::to_value(&thumbnail)?);
        }

        let updated = self.apply(video_id, changes).await?;
        if thumbnail_path.is_some() && !self.assets.delete(&video.thumbnail.url).await {
            tracing::warn!(url = %video.thumbnail.url, "failed to delete replaced thumbnail");
        }
        Ok(updated)
    }

    /// Deletes a video together with everything that depends on it. Owner
    /// only.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, caller: DocumentId, video_id: DocumentId) -> Result<()> {
        let video = self.get(video_id).await?;
        ensure_owner(video.owner, caller, "You are not allowed to delete this video")?;

        let deleted = self
            .store
            .delete_cascade(collections::VIDEOS, video_id, &video_cascade())
            .await?;
        if !deleted {
            return Err(DomainError::not_found("Video"));
        }

        for asset in [&video.video_file, &video.thumbnail] {
            if !self.assets.delete(&asset.url).await {
                tracing::warn!(url = %asset.url, "failed to delete video asset");
            }
        }
        tracing::info!(%video_id, "video deleted");
        Ok(())
    }

    /// Flips the publication flag. Owner only.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_publish(&self, caller: DocumentId, video_id: DocumentId) -> Result<Video> {
        let video = self.get(video_id).await?;
        ensure_owner(video.owner, caller, "You are not allowed to modify this video")?;
        self.apply(
            video_id,
            Changes::new().set("isPublished", !video.is_published),
        )
        .await
    }

    /// Counts a view and, for signed-in viewers, moves the video to the
    /// front of their watch history.
    #[tracing::instrument(skip(self))]
    pub async fn record_view(&self, video_id: DocumentId, viewer: Option<DocumentId>) -> Result<()> {
        self.apply(video_id, Changes::new().inc("views", 1)).await?;

        if let Some(viewer) = viewer {
            self.store
                .update_by_id(
                    collections::ACCOUNTS,
                    viewer,
                    &Changes::new().push_front(
                        "watchHistory",
                        id_value(video_id),
                        Some(WATCH_HISTORY_LIMIT),
                    ),
                    WriteOptions::new(),
                )
                .await?;
        }
        Ok(())
    }

    async fn apply(&self, video_id: DocumentId, changes: Changes) -> Result<Video> {
        let doc = self
            .store
            .update_by_id(collections::VIDEOS, video_id, &changes, WriteOptions::new())
            .await?
            .ok_or(DomainError::not_found("Video"))?;
        Ok(doc.into_typed()?)
    }
}
