//! Comments on videos.

use common::DocumentId;
use doc_store::{Cascade, Changes, DocumentStore, DocumentStoreExt, WriteOptions};
use serde::Serialize;

use crate::error::{DomainError, Result};
use crate::model::{Comment, collections};
use crate::support::{self, ensure_owner, required};

#[derive(Serialize)]
struct NewComment<'a> {
    content: &'a str,
    video: DocumentId,
    owner: DocumentId,
}

/// Service for writing comments.
pub struct CommentService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> CommentService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, content))]
    pub async fn add(
        &self,
        caller: DocumentId,
        video_id: DocumentId,
        content: &str,
    ) -> Result<Comment> {
        if !self.store.exists(collections::VIDEOS, video_id).await? {
            return Err(DomainError::not_found("Video"));
        }
        let content = required(content, "Missing comment content")?;

        let new = NewComment {
            content: &content,
            video: video_id,
            owner: caller,
        };
        support::insert(&self.store, collections::COMMENTS, &new, WriteOptions::new()).await
    }

    pub async fn get(&self, comment_id: DocumentId) -> Result<Comment> {
        support::load(&self.store, collections::COMMENTS, comment_id, "Comment").await
    }

    /// Replaces the text of a comment. Owner only.
    #[tracing::instrument(skip(self, content))]
    pub async fn update(
        &self,
        caller: DocumentId,
        comment_id: DocumentId,
        content: &str,
    ) -> Result<Comment> {
        let content = required(content, "Missing comment content")?;
        let comment = self.get(comment_id).await?;
        ensure_owner(comment.owner, caller, "You are not allowed to update this comment")?;

        let doc = self
            .store
            .update_by_id(
                collections::COMMENTS,
                comment_id,
                &Changes::new().set("content", content),
                WriteOptions::new(),
            )
            .await?
            .ok_or(DomainError::not_found("Comment"))?;
        Ok(doc.into_typed()?)
    }

    /// Deletes a comment and the likes it received. Owner only.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, caller: DocumentId, comment_id: DocumentId) -> Result<()> {
        let comment = self.get(comment_id).await?;
        ensure_owner(comment.owner, caller, "You are not allowed to delete this comment")?;

        let deleted = self
            .store
            .delete_cascade(
                collections::COMMENTS,
                comment_id,
                &[Cascade::delete(collections::LIKES, "comment")],
            )
            .await?;
        if !deleted {
            return Err(DomainError::not_found("Comment"));
        }
        Ok(())
    }
}
