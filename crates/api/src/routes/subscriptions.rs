//! Subscription toggle and listings.

use std::sync::Arc;

use axum::extract::{Path, State};
use doc_store::{Document, DocumentStore};
use domain::parse_id;
use serde_json::{Value, json};

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::routes::AppState;

/// POST /subscriptions/c/{channelId}
#[tracing::instrument(skip(state, ctx))]
pub async fn toggle<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(channel_id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let caller = ctx.require()?;
    let channel = parse_id("channelId", &channel_id)?;
    let subscribed = state.subscriptions.toggle(caller.id, channel).await?;
    let message = if subscribed {
        "Subscription added"
    } else {
        "Subscription removed"
    };
    Ok(ApiResponse::ok(json!({}), message))
}

/// GET /subscriptions/c/{channelId}
#[tracing::instrument(skip(state, ctx))]
pub async fn subscribers<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(channel_id): Path<String>,
) -> Result<ApiResponse<Vec<Document>>, ApiError> {
    let subscribers = state
        .subscription_views
        .channel_subscribers(&channel_id, ctx.caller_id())
        .await?;
    Ok(ApiResponse::ok(subscribers, "Subscribers fetched successfully"))
}

/// GET /subscriptions/u/{subscriberId}
#[tracing::instrument(skip(state))]
pub async fn channels<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(subscriber_id): Path<String>,
) -> Result<ApiResponse<Vec<Document>>, ApiError> {
    let channels = state
        .subscription_views
        .subscribed_channels(&subscriber_id)
        .await?;
    Ok(ApiResponse::ok(channels, "Subscribed channels fetched successfully"))
}
