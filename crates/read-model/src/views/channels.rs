//! Channel profiles and watch history.

use common::DocumentId;
use doc_store::{Derivation, Document, DocumentStore, Lookup, Pipeline};
use domain::collections;
use serde_json::Value;

use crate::error::{ReadModelError, Result};
use crate::query::QueryBuilder;
use crate::shaper::Shaper;

use super::{account_lookup, owner_details, video_card};

/// Read model over accounts viewed as channels.
pub struct ChannelsView<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> ChannelsView<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Public profile of the channel with handle `username`.
    #[tracing::instrument(skip(self))]
    pub async fn channel_profile(
        &self,
        username: &str,
        viewer: Option<DocumentId>,
    ) -> Result<Document> {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Err(ReadModelError::Validation("Username is missing".into()));
        }

        QueryBuilder::new(collections::ACCOUNTS)
            .filter_eq("username", username)
            .join_count(
                Lookup::new(collections::SUBSCRIPTIONS, "_id", "channel", "subscribers"),
                "subscriberCount",
            )
            .join_count(
                Lookup::new(collections::SUBSCRIPTIONS, "_id", "subscriber", "subscribedTo"),
                "subscribedToCount",
            )
            .membership("isSubscribedByCaller", "subscribers", "subscriber", viewer)
            .unsorted()
            .shape(
                Shaper::new()
                    .keep_all(&["_id", "username", "fullname"])
                    .asset_url("avatarUrl", "avatar")
                    .asset_url("coverImageUrl", "coverImage")
                    .keep_all(&[
                        "subscriberCount",
                        "subscribedToCount",
                        "isSubscribedByCaller",
                    ]),
            )
            .fetch_one(&self.store, "Channel")
            .await
    }

    /// Videos `viewer` watched, most recent first, with their owners.
    #[tracing::instrument(skip(self))]
    pub async fn watch_history(&self, viewer: DocumentId) -> Result<Vec<Document>> {
        let history = Lookup::new(collections::VIDEOS, "watchHistory", "_id", "watchHistory")
            .with_pipeline(
                Pipeline::new()
                    .lookup(account_lookup("owner", "owner"))
                    .add_field("owner", Derivation::First("owner".into())),
            );

        let account = QueryBuilder::new(collections::ACCOUNTS)
            .filter_ref("_id", viewer)
            .join_many(history)
            .unsorted()
            .shape(Shaper::new().each(
                "watchHistory",
                "watchHistory",
                video_card().object("ownerDetails", "owner", owner_details()),
            ))
            .fetch_one(&self.store, "User")
            .await?;

        let entries = match account.into_value().get_mut("watchHistory").map(Value::take) {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        };
        entries
            .into_iter()
            .map(|entry| Document::from_value(entry).map_err(ReadModelError::from))
            .collect()
    }
}
