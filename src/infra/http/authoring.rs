//! Login-only routes: post authoring, comments and follow edges.

use axum::{
    Form, Json,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use tracing::debug;

use crate::{
    application::{
        error::HttpError,
        follow::{FollowOutcome, UnfollowOutcome},
        posts::{EditAccess, EditOutcome, PostDraft, PostError, PostFormContext},
    },
    domain::{posts::CommentFormInput, uploads::ImageUpload},
};

use super::{
    CurrentUser, HttpState,
    error::{follow_error, multipart_error, post_error, validation_response},
    public::parse_post_id,
};

const INDEX_PATH: &str = "/";

fn profile_path(username: &str) -> String {
    format!("/profile/{username}")
}

fn post_path(id: impl std::fmt::Display) -> String {
    format!("/posts/{id}")
}

/// Collect `text`, `group` and `image` parts. An empty file input counts as
/// no image.
async fn read_post_draft(
    source: &'static str,
    mut multipart: Multipart,
) -> Result<PostDraft, HttpError> {
    let mut draft = PostDraft::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(source, err))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => {
                draft.form.text = field
                    .text()
                    .await
                    .map_err(|err| multipart_error(source, err))?;
            }
            "group" => {
                draft.form.group = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| multipart_error(source, err))?,
                );
            }
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes: Bytes = field
                    .bytes()
                    .await
                    .map_err(|err| multipart_error(source, err))?;
                if !(filename.is_empty() && bytes.is_empty()) {
                    draft.image = Some(ImageUpload {
                        filename,
                        content_type,
                        bytes,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(draft)
}

pub(super) async fn create_form(
    State(state): State<HttpState>,
    CurrentUser(_principal): CurrentUser,
) -> Result<Json<PostFormContext>, HttpError> {
    state
        .posts
        .create_form()
        .await
        .map(Json)
        .map_err(|err| post_error("infra::http::authoring::create_form", err))
}

pub(super) async fn create_post(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    multipart: Multipart,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::authoring::create_post";

    let draft = read_post_draft(SOURCE, multipart).await?;
    let submitted = draft.form.clone();

    match state.posts.create_post(&principal, draft).await {
        Ok(_) => {
            // The index lists every post, so a new one makes its cached pages stale.
            state.cache.clear();
            Ok(Redirect::to(&profile_path(&principal.username)).into_response())
        }
        Err(PostError::Invalid(errors)) => Ok(validation_response(SOURCE, &submitted, &errors)),
        Err(err) => Err(post_error(SOURCE, err)),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::authoring::edit_form";
    let id = parse_post_id(SOURCE, &raw_id)?;

    match state.posts.edit_form(&principal, id).await {
        Ok(EditAccess::Allowed(context)) => Ok(Json(context).into_response()),
        Ok(EditAccess::NotAuthor) => Ok(Redirect::to(INDEX_PATH).into_response()),
        Err(err) => Err(post_error(SOURCE, err)),
    }
}

pub(super) async fn edit_post(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    Path(raw_id): Path<String>,
    multipart: Multipart,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::authoring::edit_post";
    let id = parse_post_id(SOURCE, &raw_id)?;

    let draft = read_post_draft(SOURCE, multipart).await?;
    let submitted = draft.form.clone();

    match state.posts.edit_post(&principal, id, draft).await {
        Ok(EditOutcome::Updated(post)) => {
            state.cache.clear();
            Ok(Redirect::to(&post_path(post.id)).into_response())
        }
        Ok(EditOutcome::NotAuthor) => Ok(Redirect::to(INDEX_PATH).into_response()),
        Err(PostError::Invalid(errors)) => Ok(validation_response(SOURCE, &submitted, &errors)),
        Err(err) => Err(post_error(SOURCE, err)),
    }
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    Path(raw_id): Path<String>,
    Form(input): Form<CommentFormInput>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::authoring::add_comment";
    let id = parse_post_id(SOURCE, &raw_id)?;
    let submitted = input.clone();

    match state.posts.add_comment(&principal, id, input).await {
        Ok(_) => Ok(Redirect::to(&post_path(id)).into_response()),
        Err(PostError::Invalid(errors)) => Ok(validation_response(SOURCE, &submitted, &errors)),
        Err(err) => Err(post_error(SOURCE, err)),
    }
}

pub(super) async fn profile_follow(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    Path(username): Path<String>,
) -> Result<Redirect, HttpError> {
    let (author, outcome) = state
        .follows
        .follow_username(principal.user_id, &username)
        .await
        .map_err(|err| follow_error("infra::http::authoring::profile_follow", err))?;

    debug!(
        target = "yatube::http::follow",
        follower = %principal.username,
        author = %author.username,
        created = matches!(outcome, FollowOutcome::Created),
        "follow request handled"
    );
    Ok(Redirect::to(&profile_path(&author.username)))
}

pub(super) async fn profile_unfollow(
    State(state): State<HttpState>,
    CurrentUser(principal): CurrentUser,
    Path(username): Path<String>,
) -> Result<Redirect, HttpError> {
    let (author, outcome) = state
        .follows
        .unfollow_username(principal.user_id, &username)
        .await
        .map_err(|err| follow_error("infra::http::authoring::profile_unfollow", err))?;

    debug!(
        target = "yatube::http::follow",
        follower = %principal.username,
        author = %author.username,
        removed = matches!(outcome, UnfollowOutcome::Removed),
        "unfollow request handled"
    );
    Ok(Redirect::to(&profile_path(&author.username)))
}
