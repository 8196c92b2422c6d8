//! Comment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use doc_store::{Document, DocumentStore};
use domain::{Comment, parse_id};
use read_model::Page;
use serde::Deserialize;

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::routes::{AppState, PageQuery};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentRequest {
    pub content: String,
}

/// GET /comments/{videoId}
#[tracing::instrument(skip(state, ctx))]
pub async fn list<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(video_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse<Page<Document>>, ApiError> {
    let comments = state
        .comment_views
        .video_comments(&video_id, ctx.caller_id(), page.request())
        .await?;
    Ok(ApiResponse::ok(comments, "Comments fetched successfully"))
}

/// POST /comments/{videoId}
#[tracing::instrument(skip(state, ctx, body))]
pub async fn add<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(video_id): Path<String>,
    body: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<ApiResponse<Comment>, ApiError> {
    let caller = ctx.require()?;
    let video = parse_id("videoId", &video_id)?;
    let Json(req) = body?;
    let comment = state.comments.add(caller.id, video, &req.content).await?;
    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

/// PATCH /comments/c/{commentId}
#[tracing::instrument(skip(state, ctx, body))]
pub async fn update<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(comment_id): Path<String>,
    body: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<ApiResponse<Comment>, ApiError> {
    let caller = ctx.require()?;
    let comment = parse_id("commentId", &comment_id)?;
    let Json(req) = body?;
    let comment = state.comments.update(caller.id, comment, &req.content).await?;
    Ok(ApiResponse::ok(comment, "Comment updated successfully"))
}

/// DELETE /comments/c/{commentId}
#[tracing::instrument(skip(state, ctx))]
pub async fn delete<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(comment_id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let caller = ctx.require()?;
    let comment = parse_id("commentId", &comment_id)?;
    state.comments.delete(caller.id, comment).await?;
    Ok(ApiResponse::ok(serde_json::json!({}), "Comment deleted successfully"))
}
