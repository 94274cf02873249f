use std::io::ErrorKind;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    application::{
        error::{ErrorReport, HttpError, codes},
        feed::{GroupPage, PostDetail, ProfilePage},
        pagination::{Page, parse_page_number},
    },
    domain::entities::PostRecord,
    infra::uploads::MediaStorageError,
};

use super::{CurrentUser, HttpState, MaybeUser, error::feed_error};

const MEDIA_CACHE_CONTROL: &str = "public, max-age=604800";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn requested(&self) -> u64 {
        parse_page_number(self.page.as_deref())
    }
}

/// Post ids in paths that do not parse are answered like unknown posts.
pub(super) fn parse_post_id(source: &'static str, raw: &str) -> Result<Uuid, HttpError> {
    Uuid::parse_str(raw).map_err(|_| HttpError::not_found(source, format!("post {raw} not found")))
}

pub(super) async fn index(
    State(state): State<HttpState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<PostRecord>>, HttpError> {
    state
        .feed
        .index_page(query.requested())
        .await
        .map(Json)
        .map_err(|err| feed_error("infra::http::public::index", err))
}

pub(super) async fn group_posts(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<GroupPage>, HttpError> {
    state
        .feed
        .group_page(&slug, query.requested())
        .await
        .map(Json)
        .map_err(|err| feed_error("infra::http::public::group_posts", err))
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProfilePage>, HttpError> {
    let viewer = viewer.map(|principal| principal.user_id);
    state
        .feed
        .profile_page(&username, viewer, query.requested())
        .await
        .map(Json)
        .map_err(|err| feed_error("infra::http::public::profile", err))
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    Path(raw_id): Path<String>,
) -> Result<Json<PostDetail>, HttpError> {
    const SOURCE: &str = "infra::http::public::post_detail";
    let id = parse_post_id(SOURCE, &raw_id)?;
    state
        .feed
        .post_detail(id)
        .await
        .map(Json)
        .map_err(|err| feed_error(SOURCE, err))
}

/// Posts by every author the caller follows.
pub(super) async fn follow_index(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<PostRecord>>, HttpError> {
    state
        .feed
        .follow_page(principal.user_id, query.requested())
        .await
        .map(Json)
        .map_err(|err| feed_error("infra::http::public::follow_index", err))
}

pub(super) async fn serve_media(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::public::serve_media";

    let bytes = match state.media.read(&path).await {
        Ok(bytes) => bytes,
        Err(MediaStorageError::InvalidPath) => {
            return Err(HttpError::not_found(SOURCE, "invalid media path"));
        }
        Err(MediaStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            return Err(HttpError::not_found(SOURCE, format!("media `{path}` not found")));
        }
        Err(err) => {
            return Err(HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::STORAGE,
                "Failed to read media",
                &err,
            ));
        }
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let mut response = bytes.into_response();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static(MEDIA_CACHE_CONTROL));
    Ok(response)
}

pub(super) async fn db_health(State(state): State<HttpState>) -> Response {
    match state.health.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::public::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

pub(super) async fn fallback(uri: Uri) -> HttpError {
    HttpError::not_found(
        "infra::http::public::fallback",
        format!("no route for `{}`", uri.path()),
    )
}
