//! Video listing, search and detail.

use common::DocumentId;
use doc_store::{
    CREATED_AT, Derivation, Document, DocumentStore, Lookup, Pipeline, SortOrder, SortSpec,
    id_value,
};
use domain::collections;

use crate::error::{ReadModelError, Result};
use crate::pager::{Page, PageRequest, Pager};
use crate::query::{QueryBuilder, parse_id};
use crate::shaper::Shaper;

use super::{account_lookup, owner_details, video_card};

const SORTABLE: [&str; 4] = ["createdAt", "views", "duration", "title"];

/// Parameters of a video listing.
#[derive(Debug, Clone, Default)]
pub struct ListVideos {
    /// Case-insensitive substring of the title.
    pub query: Option<String>,
    pub owner_id: Option<String>,
    pub sort_by: Option<String>,
    /// `asc` for ascending; anything else sorts descending.
    pub sort_type: Option<String>,
    pub page: PageRequest,
}

impl ListVideos {
    fn sort(&self) -> SortSpec {
        let field = self
            .sort_by
            .as_deref()
            .filter(|f| SORTABLE.contains(f))
            .unwrap_or(CREATED_AT);
        let ascending = matches!(
            self.sort_type.as_deref(),
            Some(t) if t.eq_ignore_ascii_case("asc")
        );
        let spec = if ascending {
            SortSpec::asc(field)
        } else {
            SortSpec::desc(field)
        };
        // Ties fall back to newest first.
        spec.then(CREATED_AT, SortOrder::Descending)
    }
}

/// Read model over videos.
pub struct VideosView<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> VideosView<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Published videos, optionally restricted to one owner and/or a title
    /// search.
    #[tracing::instrument(skip(self))]
    pub async fn list_videos(&self, params: ListVideos) -> Result<Page<Document>> {
        let mut query = QueryBuilder::new(collections::VIDEOS).filter_eq("isPublished", true);
        if let Some(owner) = params.owner_id.as_deref().filter(|o| !o.trim().is_empty()) {
            query = query.filter_id("owner", "userId", owner)?;
        }
        if let Some(needle) = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            query = query.filter_text("title", needle);
        }

        let query = query
            .join_one(account_lookup("owner", "owner"))
            .sort(params.sort())
            .shape(video_card().object("ownerDetails", "owner", owner_details()));

        Pager::new(&self.store).paginate(&query, params.page).await
    }

    /// One video with its like statistics and owner's channel statistics
    /// relative to `viewer`. Unpublished videos are visible to their owner
    /// only.
    #[tracing::instrument(skip(self))]
    pub async fn video_detail(&self, video_id: &str, viewer: Option<DocumentId>) -> Result<Document> {
        let video = parse_id("videoId", video_id)?;

        let owner = Lookup::new(collections::ACCOUNTS, "owner", "_id", "owner").with_pipeline(
            Pipeline::new()
                .lookup(Lookup::new(
                    collections::SUBSCRIPTIONS,
                    "_id",
                    "channel",
                    "subscribers",
                ))
                .add_field("subscriberCount", Derivation::Count("subscribers".into()))
                .add_field(
                    "isSubscribedByCaller",
                    Derivation::Contains {
                        array: "subscribers".into(),
                        field: "subscriber".into(),
                        value: viewer.map(id_value),
                    },
                ),
        );

        let detail = QueryBuilder::new(collections::VIDEOS)
            .filter_ref("_id", video)
            .join_count(
                Lookup::new(collections::LIKES, "_id", "video", "likes"),
                "totalLikes",
            )
            .membership("likedByMe", "likes", "likedBy", viewer)
            .join_one(owner)
            .unsorted()
            .shape(
                video_card()
                    .keep_all(&["isPublished", "totalLikes", "likedByMe"])
                    .object(
                        "ownerDetails",
                        "owner",
                        Shaper::new()
                            .keep_all(&["_id", "username"])
                            .asset_url("avatarUrl", "avatar")
                            .keep_all(&["subscriberCount", "isSubscribedByCaller"]),
                    ),
            )
            .fetch_one(&self.store, "Video")
            .await?;

        let published = detail
            .get("isPublished")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let owned_by_viewer = viewer.is_some_and(|viewer| {
            detail.get_path("ownerDetails._id") == Some(&id_value(viewer))
        });
        if !published && !owned_by_viewer {
            return Err(ReadModelError::NotFound { entity: "Video" });
        }
        Ok(detail)
    }
}
