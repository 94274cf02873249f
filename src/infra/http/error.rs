//! Mapping of service errors onto HTTP responses.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    application::{
        error::{ErrorReport, HttpError, codes, repo_error_to_http},
        feed::FeedError,
        follow::FollowError,
        posts::PostError,
    },
    domain::forms::FieldErrors,
    infra::uploads::MediaStorageError,
};

#[derive(Serialize)]
struct ValidationBody<'a, T: Serialize> {
    fields: &'a T,
    errors: &'a FieldErrors,
}

/// `400` echoing the submitted fields next to the per-field errors.
pub fn validation_response<T: Serialize>(
    source: &'static str,
    fields: &T,
    errors: &FieldErrors,
) -> Response {
    let body = ValidationBody { fields, errors };
    let mut response = (StatusCode::BAD_REQUEST, Json(body)).into_response();
    let invalid: Vec<&str> = errors.fields().collect();
    ErrorReport::from_message(
        source,
        StatusCode::BAD_REQUEST,
        format!("invalid fields: {}", invalid.join(", ")),
    )
    .attach(&mut response);
    response
}

pub fn follow_error(source: &'static str, err: FollowError) -> HttpError {
    match err {
        FollowError::UnknownAuthor(username) => {
            HttpError::not_found(source, format!("author `{username}` not found"))
        }
        FollowError::Repo(err) => repo_error_to_http(source, err),
    }
}

pub fn feed_error(source: &'static str, err: FeedError) -> HttpError {
    match err {
        FeedError::UnknownGroup(slug) => {
            HttpError::not_found(source, format!("group `{slug}` not found"))
        }
        FeedError::UnknownAuthor(username) => {
            HttpError::not_found(source, format!("author `{username}` not found"))
        }
        FeedError::UnknownPost(id) => HttpError::not_found(source, format!("post {id} not found")),
        FeedError::Follow(err) => follow_error(source, err),
        FeedError::Repo(err) => repo_error_to_http(source, err),
    }
}

/// Validation failures are answered by the handler, which still holds the
/// submitted fields; they only reach this mapping as a fallback.
pub fn post_error(source: &'static str, err: PostError) -> HttpError {
    match err {
        PostError::UnknownPost(id) => HttpError::not_found(source, format!("post {id} not found")),
        PostError::Invalid(ref errors) => {
            let invalid: Vec<&str> = errors.fields().collect();
            HttpError::from_error(
                source,
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Submitted form is invalid",
                &err,
            )
            .with_hint(invalid.join(", "))
        }
        PostError::Storage(MediaStorageError::EmptyPayload) => HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            codes::BAD_REQUEST,
            "Uploaded file is empty",
            "uploaded file is empty",
        ),
        PostError::Storage(ref storage) => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::STORAGE,
            "Failed to store image",
            storage,
        ),
        PostError::Repo(err) => repo_error_to_http(source, err),
    }
}

pub(super) fn multipart_error(source: &'static str, err: MultipartError) -> HttpError {
    let status = err.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        codes::PAYLOAD_TOO_LARGE
    } else {
        codes::BAD_REQUEST
    };
    HttpError::new(
        source,
        status,
        code,
        "Malformed upload",
        err.body_text(),
    )
}
