//! Domain layer for the video platform.
//!
//! This crate provides:
//! - the stored entities and their public wire shapes
//! - the error taxonomy shared by every layer above the store
//! - ports for the asset host and password hashing
//! - services for every mutating operation (accounts, videos, comments,
//!   likes, subscriptions, playlists)

pub mod account;
pub mod comment;
pub mod error;
pub mod like;
pub mod model;
pub mod playlist;
pub mod ports;
pub mod subscription;
pub mod support;
pub mod video;

#[cfg(test)]
mod testing;

pub use account::{AccountService, Credentials, IssuedTokens, RegisterAccount, TokenPolicy};
pub use comment::CommentService;
pub use error::{DomainError, Result};
pub use like::{LikeService, LikeTarget};
pub use model::{
    Account, AssetRef, Comment, Like, Playlist, PublicAccount, PublicVideo, Session,
    Subscription, Video, collections,
};
pub use playlist::PlaylistService;
pub use ports::{AssetHost, InMemoryAssetHost, PasswordHasher, extract_public_id};
pub use subscription::SubscriptionService;
pub use support::parse_id;
pub use video::{PublishVideo, UpdateVideo, VideoService, video_cascade};
