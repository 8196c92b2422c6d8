//! Videos a viewer has liked.

use common::DocumentId;
use doc_store::{Derivation, Document, DocumentStore, Filter, Lookup, Pipeline};
use domain::collections;

use crate::error::Result;
use crate::query::QueryBuilder;

use super::{account_lookup, owner_details, video_card_from};

/// Read model over a viewer's likes.
pub struct LikesView<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> LikesView<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Published videos `viewer` liked, most recently liked first.
    #[tracing::instrument(skip(self))]
    pub async fn liked_videos(&self, viewer: DocumentId) -> Result<Vec<Document>> {
        let videos = Lookup::new(collections::VIDEOS, "video", "_id", "video").with_pipeline(
            Pipeline::new()
                .filter(Filter::new().eq("isPublished", true))
                .lookup(account_lookup("owner", "owner"))
                .add_field("owner", Derivation::First("owner".into())),
        );

        QueryBuilder::new(collections::LIKES)
            .filter_ref("likedBy", viewer)
            .join_one(videos)
            .then_filter(Filter::new().exists("video", true))
            .shape(video_card_from("video").object("ownerDetails", "video.owner", owner_details()))
            .fetch(&self.store)
            .await
    }
}
