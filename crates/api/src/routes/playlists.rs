//! Playlist endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use doc_store::{Document, DocumentStore};
use domain::{Playlist, parse_id};
use serde::Deserialize;

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// POST /playlist
#[tracing::instrument(skip(state, ctx, body))]
pub async fn create<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    body: Result<Json<CreatePlaylistRequest>, JsonRejection>,
) -> Result<ApiResponse<Playlist>, ApiError> {
    let caller = ctx.require()?;
    let Json(req) = body?;
    let playlist = state
        .playlists
        .create(caller.id, &req.name, req.description.as_deref())
        .await?;
    Ok(ApiResponse::created(playlist, "Playlist created successfully"))
}

/// GET /playlist/user/{userId}
#[tracing::instrument(skip(state))]
pub async fn user_playlists<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<Vec<Document>>, ApiError> {
    let playlists = state.playlist_views.user_playlists(&user_id).await?;
    Ok(ApiResponse::ok(playlists, "Playlists fetched successfully"))
}

/// GET /playlist/{playlistId}
#[tracing::instrument(skip(state))]
pub async fn detail<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(playlist_id): Path<String>,
) -> Result<ApiResponse<Document>, ApiError> {
    let playlist = state.playlist_views.playlist_detail(&playlist_id).await?;
    Ok(ApiResponse::ok(playlist, "Playlist fetched successfully"))
}

/// PATCH /playlist/{playlistId}
#[tracing::instrument(skip(state, ctx, body))]
pub async fn update<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(playlist_id): Path<String>,
    body: Result<Json<UpdatePlaylistRequest>, JsonRejection>,
) -> Result<ApiResponse<Playlist>, ApiError> {
    let caller = ctx.require()?;
    let playlist = parse_id("playlistId", &playlist_id)?;
    let Json(req) = body?;
    let playlist = state
        .playlists
        .update(
            caller.id,
            playlist,
            req.name.as_deref(),
            req.description.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok(playlist, "Playlist updated successfully"))
}

/// DELETE /playlist/{playlistId}
#[tracing::instrument(skip(state, ctx))]
pub async fn delete<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(playlist_id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let caller = ctx.require()?;
    let playlist = parse_id("playlistId", &playlist_id)?;
    state.playlists.delete(caller.id, playlist).await?;
    Ok(ApiResponse::ok(serde_json::json!({}), "Playlist deleted successfully"))
}

/// PATCH /playlist/add/{videoId}/{playlistId}
#[tracing::instrument(skip(state, ctx))]
pub async fn add_video<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> Result<ApiResponse<Playlist>, ApiError> {
    let caller = ctx.require()?;
    let video = parse_id("videoId", &video_id)?;
    let playlist = parse_id("playlistId", &playlist_id)?;
    let playlist = state.playlists.add_video(caller.id, playlist, video).await?;
    Ok(ApiResponse::ok(playlist, "Video added to playlist"))
}

/// PATCH /playlist/remove/{videoId}/{playlistId}
#[tracing::instrument(skip(state, ctx))]
pub async fn remove_video<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> Result<ApiResponse<Playlist>, ApiError> {
    let caller = ctx.require()?;
    let video = parse_id("videoId", &video_id)?;
    let playlist = parse_id("playlistId", &playlist_id)?;
    let playlist = state
        .playlists
        .remove_video(caller.id, playlist, video)
        .await?;
    Ok(ApiResponse::ok(playlist, "Video removed from playlist"))
}
