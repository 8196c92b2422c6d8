//! Likes on videos and comments.

use common::DocumentId;
use doc_store::{DocumentStore, DocumentStoreExt, Filter, id_value};

use crate::error::{DomainError, Result};
use crate::model::collections;

/// What a like points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Video(DocumentId),
    Comment(DocumentId),
}

impl LikeTarget {
    fn field(&self) -> &'static str {
        match self {
            LikeTarget::Video(_) => "video",
            LikeTarget::Comment(_) => "comment",
        }
    }

    fn id(&self) -> DocumentId {
        match self {
            LikeTarget::Video(id) | LikeTarget::Comment(id) => *id,
        }
    }

    fn collection(&self) -> &'static str {
        match self {
            LikeTarget::Video(_) => collections::VIDEOS,
            LikeTarget::Comment(_) => collections::COMMENTS,
        }
    }

    fn entity(&self) -> &'static str {
        match self {
            LikeTarget::Video(_) => "Video",
            LikeTarget::Comment(_) => "Comment",
        }
    }
}

/// Service for toggling likes.
pub struct LikeService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> LikeService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Likes the target, or removes the caller's like if one exists.
    ///
    /// Returns true when the target is liked afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn toggle(&self, caller: DocumentId, target: LikeTarget) -> Result<bool> {
        if !self.store.exists(target.collection(), target.id()).await? {
            return Err(DomainError::not_found(target.entity()));
        }

        let key = Filter::new()
            .eq(target.field(), id_value(target.id()))
            .eq("likedBy", id_value(caller));
        let liked = self.store.toggle(collections::LIKES, &key).await?.is_added();

        metrics::counter!("likes_toggled_total", "target" => target.field()).increment(1);
        tracing::debug!(liked, "like toggled");
        Ok(liked)
    }
}

#[cfg(test)]
mod tests {
    use doc_store::{Document, InMemoryDocumentStore, WriteOptions};
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn toggle_twice_restores_membership() {
        let store = InMemoryDocumentStore::new();
        let video = store
            .insert(
                collections::VIDEOS,
                Document::from_value(json!({"title": "v"})).unwrap(),
                WriteOptions::new(),
            )
            .await
            .unwrap();
        let target = LikeTarget::Video(video.id().unwrap());
        let service = LikeService::new(store.clone());
        let caller = DocumentId::new();

        assert!(service.toggle(caller, target).await.unwrap());
        assert_eq!(store.count(collections::LIKES, &Filter::new()).await.unwrap(), 1);
        assert!(!service.toggle(caller, target).await.unwrap());
        assert_eq!(store.count(collections::LIKES, &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn toggle_on_missing_target_is_not_found() {
        let service = LikeService::new(InMemoryDocumentStore::new());
        let err = service
            .toggle(DocumentId::new(), LikeTarget::Comment(DocumentId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Comment" }));
    }
}
