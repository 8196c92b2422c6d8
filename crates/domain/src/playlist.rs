//! Playlists: ordered, duplicate-free lists of videos.

use common::DocumentId;
use doc_store::{Changes, DocumentStore, DocumentStoreExt, WriteOptions, id_value};
use serde::Serialize;

use crate::error::{DomainError, Result};
use crate::model::{Playlist, collections};
use crate::support::{self, ensure_owner, optional, required};

#[derive(Serialize)]
struct NewPlaylist<'a> {
    name: &'a str,
    description: &'a str,
    owner: DocumentId,
    videos: Vec<DocumentId>,
}

/// Service for playlist maintenance.
pub struct PlaylistService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> PlaylistService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(
        &self,
        owner: DocumentId,
        name: &str,
        description: Option<&str>,
    ) -> Result<Playlist> {
        let name = required(name, "Missing name")?;
        let description = optional(description).unwrap_or_default();

        let new = NewPlaylist {
            name: &name,
            description: &description,
            owner,
            videos: Vec::new(),
        };
        support::insert(&self.store, collections::PLAYLISTS, &new, WriteOptions::new()).await
    }

    pub async fn get(&self, playlist_id: DocumentId) -> Result<Playlist> {
        support::load(&self.store, collections::PLAYLISTS, playlist_id, "Playlist").await
    }

    /// Renames and/or redescribes a playlist. Owner only.
    #[tracing::instrument(skip(self))]
    pub async fn update(
        &self,
        caller: DocumentId,
        playlist_id: DocumentId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Playlist> {
        let name = optional(name);
        let description = optional(description);
        if name.is_none() && description.is_none() {
            return Err(DomainError::validation("Nothing to update"));
        }
        self.owned(caller, playlist_id).await?;

        let mut changes = Changes::new();
        if let Some(name) = name {
            changes = changes.set("name", name);
        }
        if let Some(description) = description {
            changes = changes.set("description", description);
        }
        self.apply(playlist_id, changes).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, caller: DocumentId, playlist_id: DocumentId) -> Result<()> {
        self.owned(caller, playlist_id).await?;
        if !self
            .store
            .delete_by_id(collections::PLAYLISTS, playlist_id)
            .await?
        {
            return Err(DomainError::not_found("Playlist"));
        }
        Ok(())
    }

    /// Appends a video unless it is already in the playlist. Owner only.
    #[tracing::instrument(skip(self))]
    pub async fn add_video(
        &self,
        caller: DocumentId,
        playlist_id: DocumentId,
        video_id: DocumentId,
    ) -> Result<Playlist> {
        self.owned(caller, playlist_id).await?;
        if !self.store.exists(collections::VIDEOS, video_id).await? {
            return Err(DomainError::not_found("Video"));
        }
        self.apply(
            playlist_id,
            Changes::new().add_to_set("videos", id_value(video_id)),
        )
        .await
    }

    /// Removes a video from the playlist. Owner only.
    #[tracing::instrument(skip(self))]
    pub async fn remove_video(
        &self,
        caller: DocumentId,
        playlist_id: DocumentId,
        video_id: DocumentId,
    ) -> Result<Playlist> {
        let playlist = self.owned(caller, playlist_id).await?;
        if !playlist.videos.contains(&video_id) {
            return Err(DomainError::not_found("Video in playlist"));
        }
        self.apply(playlist_id, Changes::new().pull("videos", id_value(video_id)))
            .await
    }

    async fn owned(&self, caller: DocumentId, playlist_id: DocumentId) -> Result<Playlist> {
        let playlist = self.get(playlist_id).await?;
        ensure_owner(playlist.owner, caller, "You are not allowed to modify this playlist")?;
        Ok(playlist)
    }

    async fn apply(&self, playlist_id: DocumentId, changes: Changes) -> Result<Playlist> {
        let doc = self
            .store
            .update_by_id(collections::PLAYLISTS, playlist_id, &changes, WriteOptions::new())
            .await?
            .ok_or(DomainError::not_found("Playlist"))?;
        Ok(doc.into_typed()?)
    }
}

#[cfg(test)]
mod tests {
    use doc_store::{Document, InMemoryDocumentStore};
    use serde_json::json;

    use super::*;

    async fn insert_video(store: &InMemoryDocumentStore) -> DocumentId {
        store
            .insert(
                collections::VIDEOS,
                Document::from_value(json!({"title": "v"})).unwrap(),
                WriteOptions::new(),
            )
            .await
            .unwrap()
            .id()
            .unwrap()
    }

    #[tokio::test]
    async fn add_video_has_set_semantics() {
        let store = InMemoryDocumentStore::new();
        let v1 = insert_video(&store).await;
        let v2 = insert_video(&store).await;
        let service = PlaylistService::new(store);
        let owner = DocumentId::new();
        let playlist = service.create(owner, "Mix", None).await.unwrap();

        service.add_video(owner, playlist.id, v1).await.unwrap();
        service.add_video(owner, playlist.id, v2).await.unwrap();
        let playlist = service.add_video(owner, playlist.id, v1).await.unwrap();
        assert_eq!(playlist.videos, vec![v1, v2]);

        let playlist = service.remove_video(owner, playlist.id, v1).await.unwrap();
        assert_eq!(playlist.videos, vec![v2]);
        assert!(matches!(
            service.remove_video(owner, playlist.id, v1).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn strangers_cannot_modify() {
        let store = InMemoryDocumentStore::new();
        let video = insert_video(&store).await;
        let service = PlaylistService::new(store);
        let playlist = service
            .create(DocumentId::new(), "Mix", Some("desc"))
            .await
            .unwrap();
        let stranger = DocumentId::new();

        assert!(matches!(
            service.add_video(stranger, playlist.id, video).await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            service.update(stranger, playlist.id, Some("x"), None).await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete(stranger, playlist.id).await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn create_requires_name() {
        let service = PlaylistService::new(InMemoryDocumentStore::new());
        assert!(matches!(
            service.create(DocumentId::new(), " ", None).await,
            Err(DomainError::Validation(_))
        ));
    }
}
