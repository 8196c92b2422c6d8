//! Subscriber and subscription listings.

use common::DocumentId;
use doc_store::{
    CREATED_AT, Derivation, Document, DocumentStore, DocumentStoreExt, Filter, Lookup, Pipeline,
    SortSpec, id_value,
};
use domain::collections;

use crate::error::{ReadModelError, Result};
use crate::query::{QueryBuilder, parse_id};
use crate::shaper::Shaper;

use super::video_card;

/// Read model over the subscription graph.
pub struct SubscriptionsView<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> SubscriptionsView<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Accounts subscribed to a channel, each with its own subscriber count
    /// and whether `viewer` subscribes to it.
    #[tracing::instrument(skip(self))]
    pub async fn channel_subscribers(
        &self,
        channel_id: &str,
        viewer: Option<DocumentId>,
    ) -> Result<Vec<Document>> {
        let channel = parse_id("channelId", channel_id)?;
        if !self.store.exists(collections::ACCOUNTS, channel).await? {
            return Err(ReadModelError::NotFound { entity: "Channel" });
        }

        let subscriber = Lookup::new(collections::ACCOUNTS, "subscriber", "_id", "subscriber")
            .with_pipeline(
                Pipeline::new()
                    .lookup(Lookup::new(
                        collections::SUBSCRIPTIONS,
                        "_id",
                        "channel",
                        "subscribedBy",
                    ))
                    .add_field("subscriberCount", Derivation::Count("subscribedBy".into()))
                    .add_field(
                        "isSubscribedByCaller",
                        Derivation::Contains {
                            array: "subscribedBy".into(),
                            field: "subscriber".into(),
                            value: viewer.map(id_value),
                        },
                    ),
            );

        QueryBuilder::new(collections::SUBSCRIPTIONS)
            .filter_ref("channel", channel)
            .join_one(subscriber)
            .then_filter(Filter::new().exists("subscriber", true))
            .shape(
                Shaper::new()
                    .rename("_id", "subscriber._id")
                    .rename("username", "subscriber.username")
                    .asset_url("avatarUrl", "subscriber.avatar")
                    .rename("subscriberCount", "subscriber.subscriberCount")
                    .rename("isSubscribedByCaller", "subscriber.isSubscribedByCaller"),
            )
            .fetch(&self.store)
            .await
    }

    /// Channels an account subscribes to, each with its published video
    /// count and latest published video.
    #[tracing::instrument(skip(self))]
    pub async fn subscribed_channels(&self, subscriber_id: &str) -> Result<Vec<Document>> {
        let subscriber = parse_id("subscriberId", subscriber_id)?;

        let published = Lookup::new(collections::VIDEOS, "_id", "owner", "videos").with_pipeline(
            Pipeline::new()
                .filter(Filter::new().eq("isPublished", true))
                .sort(SortSpec::desc(CREATED_AT)),
        );
        let channel = Lookup::new(collections::ACCOUNTS, "channel", "_id", "channel")
            .with_pipeline(
                Pipeline::new()
                    .lookup(published)
                    .add_field("totalVideos", Derivation::Count("videos".into()))
                    .add_field("latestVideo", Derivation::First("videos".into())),
            );

        QueryBuilder::new(collections::SUBSCRIPTIONS)
            .filter_ref("subscriber", subscriber)
            .join_one(channel)
            .then_filter(Filter::new().exists("channel", true))
            .shape(
                Shaper::new()
                    .rename("_id", "channel._id")
                    .rename("username", "channel.username")
                    .asset_url("avatarUrl", "channel.avatar")
                    .rename("totalVideos", "channel.totalVideos")
                    .object("latestVideo", "channel.latestVideo", video_card()),
            )
            .fetch(&self.store)
            .await
    }
}
