//! Playlist listings.

use doc_store::{
    CREATED_AT, Derivation, Document, DocumentStore, DocumentStoreExt, Filter, Lookup, Pipeline,
    SortSpec,
};
use domain::collections;

use crate::error::{ReadModelError, Result};
use crate::query::{QueryBuilder, parse_id};
use crate::shaper::Shaper;

use super::{account_lookup, owner_summary, video_card};

fn published_videos(as_field: &str) -> Lookup {
    Lookup::new(collections::VIDEOS, "videos", "_id", as_field).with_pipeline(
        Pipeline::new()
            .filter(Filter::new().eq("isPublished", true))
            .sort(SortSpec::desc(CREATED_AT)),
    )
}

/// Read model over playlists.
pub struct PlaylistsView<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> PlaylistsView<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Playlists owned by an account, each with its published video count
    /// and the thumbnail of its newest published video as cover.
    #[tracing::instrument(skip(self))]
    pub async fn user_playlists(&self, owner_id: &str) -> Result<Vec<Document>> {
        let owner = parse_id("userId", owner_id)?;
        if !self.store.exists(collections::ACCOUNTS, owner).await? {
            return Err(ReadModelError::NotFound { entity: "User" });
        }

        QueryBuilder::new(collections::PLAYLISTS)
            .filter_ref("owner", owner)
            .join_count(published_videos("publishedVideos"), "totalVideos")
            .derive(
                "coverThumbnail",
                Derivation::FirstOf {
                    array: "publishedVideos".into(),
                    field: "thumbnail".into(),
                },
            )
            .shape(
                Shaper::new()
                    .keep_all(&["_id", "name", "description", "totalVideos"])
                    .asset_url("coverThumbnailUrl", "coverThumbnail")
                    .keep("updatedAt"),
            )
            .fetch(&self.store)
            .await
    }

    /// One playlist with its owner and published videos, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn playlist_detail(&self, playlist_id: &str) -> Result<Document> {
        let playlist = parse_id("playlistId", playlist_id)?;

        QueryBuilder::new(collections::PLAYLISTS)
            .filter_ref("_id", playlist)
            .join_count(published_videos("videos"), "totalVideos")
            .join_one(account_lookup("owner", "owner"))
            .unsorted()
            .shape(
                Shaper::new()
                    .keep_all(&["_id", "name", "description", "createdAt", "totalVideos"])
                    .object("owner", "owner", owner_summary())
                    .each("videos", "videos", video_card()),
            )
            .fetch_one(&self.store, "Playlist")
            .await
    }
}
