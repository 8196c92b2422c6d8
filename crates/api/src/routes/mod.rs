//! HTTP handlers, grouped by resource.

pub mod comments;
pub mod health;
pub mod likes;
pub mod metrics;
pub mod playlists;
pub mod subscriptions;
pub mod users;
pub mod videos;

use doc_store::DocumentStore;
use domain::{
    AccountService, CommentService, LikeService, PlaylistService, SubscriptionService,
    VideoService,
};
use read_model::{
    ChannelsView, CommentsView, LikesView, PageRequest, PlaylistsView, SubscriptionsView,
    VideosView,
};
use serde::Deserialize;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub accounts: AccountService<S>,
    pub videos: VideoService<S>,
    pub comments: CommentService<S>,
    pub likes: LikeService<S>,
    pub subscriptions: SubscriptionService<S>,
    pub playlists: PlaylistService<S>,
    pub video_views: VideosView<S>,
    pub comment_views: CommentsView<S>,
    pub like_views: LikesView<S>,
    pub subscription_views: SubscriptionsView<S>,
    pub channel_views: ChannelsView<S>,
    pub playlist_views: PlaylistsView<S>,
}

/// `?page=&limit=` query parameters; malformed values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref(), self.limit.as_deref())
    }
}
