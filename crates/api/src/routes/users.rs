//! Account, session and channel endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use doc_store::{Document, DocumentStore};
use domain::{Credentials, IssuedTokens, PublicAccount, RegisterAccount};
use serde::{Deserialize, Serialize};

use crate::context::{self, REFRESH_TOKEN_COOKIE, RequestContext};
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::routes::AppState;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub fullname: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub avatar_path: Option<String>,
    pub cover_image_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAccountRequest {
    pub fullname: Option<String>,
    pub email: Option<String>,
}

/// Staged image to replace an avatar or cover image with.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImageRequest {
    pub path: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: PublicAccount,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// -- Handlers --

/// POST /users/register
#[tracing::instrument(skip(state, body))]
pub async fn register<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicAccount>, ApiError> {
    let Json(req) = body?;
    let account = state
        .accounts
        .register(RegisterAccount {
            fullname: req.fullname,
            email: req.email,
            username: req.username,
            password: req.password,
            avatar_path: req.avatar_path,
            cover_image_path: req.cover_image_path,
        })
        .await?;
    Ok(ApiResponse::created(account.public(), "User registered successfully"))
}

/// POST /users/login
#[tracing::instrument(skip(state, body))]
pub async fn login<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let issued = state
        .accounts
        .login(Credentials {
            username: req.username,
            email: req.email,
            password: req.password,
        })
        .await?;

    let IssuedTokens {
        account,
        access_token,
        refresh_token,
    } = issued;
    Ok((
        context::token_cookies(&access_token, &refresh_token),
        ApiResponse::ok(
            SessionResponse {
                user: account.public(),
                access_token,
                refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

/// POST /users/logout
#[tracing::instrument(skip(state, ctx))]
pub async fn logout<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let caller = ctx.require()?;
    state.accounts.logout(caller.id, ctx.access_token()).await?;
    Ok((
        context::cleared_cookies(),
        ApiResponse::ok(serde_json::json!({}), "User logged out"),
    ))
}

/// POST /users/refresh-token, reading the token from the cookie or the body.
#[tracing::instrument(skip(state, headers, body))]
pub async fn refresh_token<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let from_body = || {
        serde_json::from_slice::<RefreshRequest>(&body)
            .ok()
            .and_then(|req| req.refresh_token)
    };
    let token = context::cookie(&headers, REFRESH_TOKEN_COOKIE)
        .or_else(from_body)
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized request".into()))?;

    let issued = state.accounts.refresh(&token).await?;
    Ok((
        context::token_cookies(&issued.access_token, &issued.refresh_token),
        ApiResponse::ok(
            TokenPair {
                access_token: issued.access_token,
                refresh_token: issued.refresh_token,
            },
            "Access token refreshed",
        ),
    ))
}

/// POST /users/change-password
#[tracing::instrument(skip(state, ctx, body))]
pub async fn change_password<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let caller = ctx.require()?;
    let Json(req) = body?;
    state
        .accounts
        .change_password(caller.id, &req.old_password, &req.new_password)
        .await?;
    Ok(ApiResponse::ok(serde_json::json!({}), "Password changed successfully"))
}

/// GET /users/current-user
#[tracing::instrument(skip(ctx))]
pub async fn current_user(ctx: RequestContext) -> Result<ApiResponse<PublicAccount>, ApiError> {
    let caller = ctx.require()?;
    Ok(ApiResponse::ok(caller.public(), "User fetched successfully"))
}

/// PATCH /users/update-account
#[tracing::instrument(skip(state, ctx, body))]
pub async fn update_account<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    body: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicAccount>, ApiError> {
    let caller = ctx.require()?;
    let Json(req) = body?;
    let account = state
        .accounts
        .update_details(caller.id, req.fullname.as_deref(), req.email.as_deref())
        .await?;
    Ok(ApiResponse::ok(account.public(), "Account details updated successfully"))
}

/// PATCH /users/avatar
#[tracing::instrument(skip(state, ctx, body))]
pub async fn update_avatar<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    body: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicAccount>, ApiError> {
    let caller = ctx.require()?;
    let Json(req) = body?;
    let account = state.accounts.update_avatar(caller.id, &req.path).await?;
    Ok(ApiResponse::ok(account.public(), "Avatar updated successfully"))
}

/// PATCH /users/cover-image
#[tracing::instrument(skip(state, ctx, body))]
pub async fn update_cover_image<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    body: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicAccount>, ApiError> {
    let caller = ctx.require()?;
    let Json(req) = body?;
    let account = state.accounts.update_cover_image(caller.id, &req.path).await?;
    Ok(ApiResponse::ok(account.public(), "Cover image updated successfully"))
}

/// GET /users/c/{username}
#[tracing::instrument(skip(state, ctx))]
pub async fn channel_profile<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
    Path(username): Path<String>,
) -> Result<ApiResponse<Document>, ApiError> {
    let profile = state
        .channel_views
        .channel_profile(&username, ctx.caller_id())
        .await?;
    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

/// GET /users/history
#[tracing::instrument(skip(state, ctx))]
pub async fn watch_history<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ctx: RequestContext,
) -> Result<ApiResponse<Vec<Document>>, ApiError> {
    let caller = ctx.require()?;
    let history = state.channel_views.watch_history(caller.id).await?;
    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}
