//! Stored entities.
//!
//! Every entity deserializes from the document the store returns, so the
//! store-managed `_id`, `createdAt` and `updatedAt` fields are part of each.

use chrono::{DateTime, Utc};
use common::DocumentId;
use serde::{Deserialize, Serialize};

/// Collection names.
pub mod collections {
    pub const ACCOUNTS: &str = "users";
    pub const VIDEOS: &str = "videos";
    pub const COMMENTS: &str = "comments";
    pub const LIKES: &str = "likes";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const PLAYLISTS: &str = "playlists";
    pub const SESSIONS: &str = "sessions";
}

/// Maximum number of entries kept in a watch history.
pub const WATCH_HISTORY_LIMIT: usize = 100;

/// Where an uploaded asset lives on the asset host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub url: String,
    pub public_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: Option<AssetRef>,
    pub cover_image: Option<AssetRef>,
    #[serde(default)]
    pub watch_history: Vec<DocumentId>,
    /// Credential hash.
    pub password: String,
    pub refresh_token: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// The account without credentials or session secrets.
    pub fn public(&self) -> PublicAccount {
        PublicAccount {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            fullname: self.fullname.clone(),
            avatar_url: self.avatar.as_ref().map(|a| a.url.clone()),
            cover_image_url: self.cover_image.as_ref().map(|a| a.url.clone()),
            watch_history: self.watch_history.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Wire shape of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub watch_history: Vec<DocumentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub owner: DocumentId,
    pub video_file: AssetRef,
    pub thumbnail: AssetRef,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub fn public(&self) -> PublicVideo {
        PublicVideo {
            id: self.id,
            owner: self.owner,
            video_file_url: self.video_file.url.clone(),
            thumbnail_url: self.thumbnail.url.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            duration: self.duration,
            views: self.views,
            is_published: self.is_published,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Wire shape of a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicVideo {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub owner: DocumentId,
    pub video_file_url: String,
    pub thumbnail_url: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub content: String,
    pub video: DocumentId,
    pub owner: DocumentId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A like targets exactly one of a video or a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub liked_by: DocumentId,
    pub video: Option<DocumentId>,
    pub comment: Option<DocumentId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub subscriber: DocumentId,
    pub channel: DocumentId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub name: String,
    pub description: String,
    pub owner: DocumentId,
    /// Ordered; a video appears at most once.
    #[serde(default)]
    pub videos: Vec<DocumentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An issued access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub token: String,
    pub account: DocumentId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
