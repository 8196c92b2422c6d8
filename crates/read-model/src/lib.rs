//! Social read-model composer.
//!
//! Read models are assembled from three parts: a [`QueryBuilder`] describing
//! the pipeline over the document store, a [`Pager`] running it one window at
//! a time, and a [`Shaper`] selecting the public fields of each result. The
//! named read models live in [`views`].

pub mod error;
pub mod pager;
pub mod query;
pub mod shaper;
pub mod views;

pub use error::{ReadModelError, Result};
pub use pager::{Page, PageRequest, Pager};
pub use query::{QueryBuilder, parse_id};
pub use shaper::Shaper;
pub use views::{
    ChannelsView, CommentsView, LikesView, ListVideos, PlaylistsView, SubscriptionsView,
    VideosView,
};
