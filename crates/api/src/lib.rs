//! HTTP API server for the video-sharing backend.
//!
//! Exposes the account, video, comment, like, subscription and playlist
//! endpoints under `/api/v1`, answering with the JSON envelope from
//! [`response`]. Requests are logged with `tracing`; metrics are served in
//! the Prometheus format at `/metrics`.

pub mod adapters;
pub mod config;
pub mod context;
pub mod error;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, patch, post};
use doc_store::DocumentStore;
use domain::{
    AccountService, AssetHost, CommentService, LikeService, PasswordHasher, PlaylistService,
    SubscriptionService, TokenPolicy, VideoService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use read_model::{
    ChannelsView, CommentsView, LikesView, PlaylistsView, SubscriptionsView, VideosView,
};
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use adapters::{Argon2Hasher, LocalDirAssetHost};
use config::Config;
use routes::AppState;

pub const API_PREFIX: &str = "/api/v1";

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    cors_origin: &str,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .nest(API_PREFIX, api_routes(state))
        .merge(metrics_router)
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
}

fn api_routes<S: DocumentStore + 'static>(state: Arc<AppState<S>>) -> Router {
    use routes::{comments, likes, playlists, subscriptions, users, videos};

    Router::new()
        .route("/users/register", post(users::register::<S>))
        .route("/users/login", post(users::login::<S>))
        .route("/users/logout", post(users::logout::<S>))
        .route("/users/refresh-token", post(users::refresh_token::<S>))
        .route("/users/change-password", post(users::change_password::<S>))
        .route("/users/current-user", get(users::current_user))
        .route("/users/update-account", patch(users::update_account::<S>))
        .route("/users/avatar", patch(users::update_avatar::<S>))
        .route("/users/cover-image", patch(users::update_cover_image::<S>))
        .route("/users/c/{username}", get(users::channel_profile::<S>))
        .route("/users/history", get(users::watch_history::<S>))
        .route("/videos", get(videos::list::<S>).post(videos::publish::<S>))
        .route(
            "/videos/{video_id}",
            get(videos::detail::<S>)
                .patch(videos::update::<S>)
                .delete(videos::delete::<S>),
        )
        .route(
            "/videos/toggle/publish/{video_id}",
            patch(videos::toggle_publish::<S>),
        )
        .route(
            "/comments/{video_id}",
            get(comments::list::<S>).post(comments::add::<S>),
        )
        .route(
            "/comments/c/{comment_id}",
            patch(comments::update::<S>).delete(comments::delete::<S>),
        )
        .route("/likes/toggle/v/{video_id}", post(likes::toggle_video::<S>))
        .route("/likes/toggle/c/{comment_id}", post(likes::toggle_comment::<S>))
        .route("/likes/videos", get(likes::liked_videos::<S>))
        .route(
            "/subscriptions/c/{channel_id}",
            post(subscriptions::toggle::<S>).get(subscriptions::subscribers::<S>),
        )
        .route(
            "/subscriptions/u/{subscriber_id}",
            get(subscriptions::channels::<S>),
        )
        .route("/playlist", post(playlists::create::<S>))
        .route("/playlist/user/{user_id}", get(playlists::user_playlists::<S>))
        .route(
            "/playlist/{playlist_id}",
            get(playlists::detail::<S>)
                .patch(playlists::update::<S>)
                .delete(playlists::delete::<S>),
        )
        .route(
            "/playlist/add/{video_id}/{playlist_id}",
            patch(playlists::add_video::<S>),
        )
        .route(
            "/playlist/remove/{video_id}/{playlist_id}",
            patch(playlists::remove_video::<S>),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            context::resolve_caller::<S>,
        ))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    match HeaderValue::from_str(origin) {
        // Cookies need an explicit origin.
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!(%origin, "invalid CORS_ORIGIN, allowing any origin");
            cors_layer("*")
        }
    }
}

/// Wires every service and read model to one store.
pub fn create_state<S: DocumentStore + Clone + 'static>(
    store: S,
    assets: Arc<dyn AssetHost>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: TokenPolicy,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        accounts: AccountService::new(store.clone(), assets.clone(), hasher, tokens),
        videos: VideoService::new(store.clone(), assets),
        comments: CommentService::new(store.clone()),
        likes: LikeService::new(store.clone()),
        subscriptions: SubscriptionService::new(store.clone()),
        playlists: PlaylistService::new(store.clone()),
        video_views: VideosView::new(store.clone()),
        comment_views: CommentsView::new(store.clone()),
        like_views: LikesView::new(store.clone()),
        subscription_views: SubscriptionsView::new(store.clone()),
        channel_views: ChannelsView::new(store.clone()),
        playlist_views: PlaylistsView::new(store),
    })
}

/// Creates the production state: Argon2 hashing, uploads taken from
/// `config.staging_dir` and stored in `config.asset_dir`.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    create_state(
        store,
        Arc::new(LocalDirAssetHost::new(
            &config.staging_dir,
            &config.asset_dir,
            &config.asset_base_url,
        )),
        Arc::new(Argon2Hasher),
        config.token_policy(),
    )
}
