//! Comment listing for a video.

use common::DocumentId;
use doc_store::{Document, DocumentStore, DocumentStoreExt, Lookup};
use domain::collections;

use crate::error::{ReadModelError, Result};
use crate::pager::{Page, PageRequest, Pager};
use crate::query::{QueryBuilder, parse_id};
use crate::shaper::Shaper;

use super::{account_lookup, owner_details};

/// Read model over a video's comments.
pub struct CommentsView<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> CommentsView<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Comments on a video, newest first, each with its author and like
    /// statistics relative to `viewer`.
    #[tracing::instrument(skip(self))]
    pub async fn video_comments(
        &self,
        video_id: &str,
        viewer: Option<DocumentId>,
        request: PageRequest,
    ) -> Result<Page<Document>> {
        let video = parse_id("videoId", video_id)?;
        if !self.store.exists(collections::VIDEOS, video).await? {
            return Err(ReadModelError::NotFound { entity: "Video" });
        }

        let query = QueryBuilder::new(collections::COMMENTS)
            .filter_ref("video", video)
            .join_one(account_lookup("owner", "owner"))
            .join_count(
                Lookup::new(collections::LIKES, "_id", "comment", "likes"),
                "totalLikes",
            )
            .membership("likedByMe", "likes", "likedBy", viewer)
            .shape(
                Shaper::new()
                    .keep_all(&["_id", "content", "createdAt"])
                    .object("ownerDetails", "owner", owner_details())
                    .keep_all(&["totalLikes", "likedByMe"]),
            );

        Pager::new(&self.store).paginate(&query, request).await
    }
}
