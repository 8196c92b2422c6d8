//! Named read models.

pub mod channels;
pub mod comments;
pub mod likes;
pub mod playlists;
pub mod subscriptions;
pub mod videos;

pub use channels::ChannelsView;
pub use comments::CommentsView;
pub use likes::LikesView;
pub use playlists::PlaylistsView;
pub use subscriptions::SubscriptionsView;
pub use videos::{ListVideos, VideosView};

use doc_store::{Lookup, Pipeline, Projection};
use domain::collections;

use crate::shaper::Shaper;

/// Joins the account referenced by `local_field`, keeping only its public
/// identity.
pub(crate) fn account_lookup(local_field: &str, as_field: &str) -> Lookup {
    Lookup::new(collections::ACCOUNTS, local_field, "_id", as_field).with_pipeline(
        Pipeline::new().project(
            Projection::new()
                .include("_id")
                .include("username")
                .include("fullname")
                .include("avatar"),
        ),
    )
}

/// `{username, avatarUrl}` of a joined account.
pub(crate) fn owner_details() -> Shaper {
    Shaper::new().keep("username").asset_url("avatarUrl", "avatar")
}

/// `{_id, username, avatarUrl}` of a joined account.
pub(crate) fn owner_summary() -> Shaper {
    Shaper::new()
        .keep("_id")
        .keep("username")
        .asset_url("avatarUrl", "avatar")
}

/// Public fields of a video listing entry.
pub(crate) fn video_card() -> Shaper {
    video_card_from("")
}

/// Public fields of a video embedded at `source`, lifted to the top level.
pub(crate) fn video_card_from(source: &str) -> Shaper {
    let at = |field: &str| {
        if source.is_empty() {
            field.to_string()
        } else {
            format!("{source}.{field}")
        }
    };
    ["_id", "title", "description", "duration", "views", "createdAt"]
        .iter()
        .fold(Shaper::new(), |shaper, field| shaper.rename(field, &at(field)))
        .asset_url("videoFileUrl", &at("videoFile"))
        .asset_url("thumbnailUrl", &at("thumbnail"))
}
