//! Video endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use doc_store::{Document, DocumentStore};
use domain::{PublicVideo, PublishVideo, UpdateVideo, parse_id};
use read_model::{ListVideos, Page};
use serde::Deserialize;

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListVideosQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishVideoRequest {
    pub title: String,
    pub description: String,
    pub video_file_path: String,
    pub thumbnail_path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_path: Option<String>,
}

/// GET /videos
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListVideosQuery>,
) -> Result<ApiResponse<Page<Document>>, ApiError> {
    let page = read_model::PageRequest::parse(query.page.as_deref(), query.limit.as_deref());
    let videos = state
        .video_views
        .list_videos(ListVideos {
            query: query.query,
            owner_id: query.user_id,
            sort_by: query.sort_by,
            sort_type: query.sort_type,
            page,
        })
        .await?;
    Ok(ApiResponse::ok(videos, "Videos fetched successfully"))
}

/// POST /videos
#[tracing::instrument(skip(state, ctx, body))]
pub async fn publish<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    body: Result<Json<PublishVideoRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicVideo>, ApiError> {
    let caller = ctx.require()?;
    let Json(req) = body?;
    let video = state
        .videos
        .publish(
            caller.id,
            PublishVideo {
                title: req.title,
                description: req.description,
                video_file_path: req.video_file_path,
                thumbnail_path: req.thumbnail_path,
            },
        )
        .await?;
    Ok(ApiResponse::created(video.public(), "Video published successfully"))
}

/// GET /videos/{videoId}: the detail view; counts a view and records it in
/// the caller's history.
#[tracing::instrument(skip(state, ctx))]
pub async fn detail<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<Document>, ApiError> {
    let viewer = ctx.caller_id();
    let video = state.video_views.video_detail(&video_id, viewer).await?;

    let id = parse_id("videoId", &video_id)?;
    state.videos.record_view(id, viewer).await?;
    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

/// PATCH /videos/{videoId}
#[tracing::instrument(skip(state, ctx, body))]
pub async fn update<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(video_id): Path<String>,
    body: Result<Json<UpdateVideoRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicVideo>, ApiError> {
    let caller = ctx.require()?;
    let id = parse_id("videoId", &video_id)?;
    let Json(req) = body?;
    let video = state
        .videos
        .update(
            caller.id,
            id,
            UpdateVideo {
                title: req.title,
                description: req.description,
                thumbnail_path: req.thumbnail_path,
            },
        )
        .await?;
    Ok(ApiResponse::ok(video.public(), "Video updated successfully"))
}

/// DELETE /videos/{videoId}, together with its comments, likes and playlist
/// entries.
#[tracing::instrument(skip(state, ctx))]
pub async fn delete<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let caller = ctx.require()?;
    let id = parse_id("videoId", &video_id)?;
    state.videos.delete(caller.id, id).await?;
    Ok(ApiResponse::ok(serde_json::json!({}), "Video deleted successfully"))
}

/// PATCH /videos/toggle/publish/{videoId}
#[tracing::instrument(skip(state, ctx))]
pub async fn toggle_publish<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<PublicVideo>, ApiError> {
    let caller = ctx.require()?;
    let id = parse_id("videoId", &video_id)?;
    let video = state.videos.toggle_publish(caller.id, id).await?;
    Ok(ApiResponse::ok(video.public(), "Publish status toggled"))
}
