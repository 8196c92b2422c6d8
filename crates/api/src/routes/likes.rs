//! Like toggles and the liked-videos listing.

use std::sync::Arc;

use axum::extract::{Path, State};
use common::DocumentId;
use doc_store::{Document, DocumentStore};
use domain::{LikeTarget, parse_id};
use serde_json::{Value, json};

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::routes::AppState;

async fn toggle<S: DocumentStore + 'static>(
    state: &AppState<S>,
    caller: DocumentId,
    target: LikeTarget,
) -> Result<ApiResponse<Value>, ApiError> {
    let liked = state.likes.toggle(caller, target).await?;
    let message = match (liked, target) {
        (true, LikeTarget::Video(_)) => "Like added to video",
        (false, LikeTarget::Video(_)) => "Like removed from video",
        (true, LikeTarget::Comment(_)) => "Like added to comment",
        (false, LikeTarget::Comment(_)) => "Like removed from comment",
    };
    Ok(ApiResponse::ok(json!({}), message))
}

/// POST /likes/toggle/v/{videoId}
#[tracing::instrument(skip(state, ctx))]
pub async fn toggle_video<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let caller = ctx.require()?.id;
    let video = parse_id("videoId", &video_id)?;
    toggle(&state, caller, LikeTarget::Video(video)).await
}

/// POST /likes/toggle/c/{commentId}
#[tracing::instrument(skip(state, ctx))]
pub async fn toggle_comment<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(comment_id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let caller = ctx.require()?.id;
    let comment = parse_id("commentId", &comment_id)?;
    toggle(&state, caller, LikeTarget::Comment(comment)).await
}

/// GET /likes/videos
#[tracing::instrument(skip(state, ctx))]
pub async fn liked_videos<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
) -> Result<ApiResponse<Vec<Document>>, ApiError> {
    let caller = ctx.require()?;
    let videos = state.like_views.liked_videos(caller.id).await?;
    Ok(ApiResponse::ok(videos, "Liked videos fetched successfully"))
}
