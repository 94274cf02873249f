//! HTTP surface: routing, authentication extractors and handlers.

mod auth;
mod authoring;
mod error;
mod middleware;
mod public;

pub use auth::{CurrentUser, MaybeUser, login_redirect};

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};

use crate::{
    application::{
        auth::UserTokenService, feed::FeedService, follow::FollowService, posts::PostService,
        repos::HealthRepo,
    },
    cache::{ResponseCache, response_cache_layer},
    infra::uploads::MediaStorage,
};

use self::middleware::{log_responses, resolve_principal, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub follows: Arc<FollowService>,
    pub posts: Arc<PostService>,
    pub tokens: Arc<UserTokenService>,
    pub media: Arc<MediaStorage>,
    pub health: Arc<dyn HealthRepo>,
    pub cache: Arc<ResponseCache>,
    /// Target of the redirect issued to anonymous callers of login-only routes.
    pub login_url: Arc<str>,
    pub max_request_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the index is response-cached; everything else renders per request.
    let cached_routes = Router::new()
        .route("/", get(public::index))
        .layer(from_fn_with_state(state.cache.clone(), response_cache_layer));

    let routes = Router::new()
        .route("/group/{slug}", get(public::group_posts))
        .route("/profile/{username}", get(public::profile))
        .route("/profile/{username}/follow", post(authoring::profile_follow))
        .route(
            "/profile/{username}/unfollow",
            post(authoring::profile_unfollow),
        )
        .route("/posts/{id}", get(public::post_detail))
        .route(
            "/posts/{id}/edit",
            get(authoring::edit_form).post(authoring::edit_post),
        )
        .route("/posts/{id}/comment", post(authoring::add_comment))
        .route(
            "/create",
            get(authoring::create_form).post(authoring::create_post),
        )
        .route("/follow", get(public::follow_index))
        .route("/media/{*path}", get(public::serve_media))
        .route("/_health/db", get(public::db_health))
        .layer(DefaultBodyLimit::max(state.max_request_bytes));

    cached_routes
        .merge(routes)
        .fallback(public::fallback)
        .layer(from_fn_with_state(state.clone(), resolve_principal))
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context))
        .with_state(state)
}
