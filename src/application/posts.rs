//! Post authoring and comments.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::auth::Principal;
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};
use crate::domain::forms::FieldErrors;
use crate::domain::posts::{CommentFormInput, INVALID_CHOICE_MESSAGE, PostForm, PostFormInput};
use crate::domain::uploads::{INVALID_IMAGE_MESSAGE, ImageUpload, inspect_image};
use crate::infra::telemetry;
use crate::infra::uploads::{MediaStorage, MediaStorageError};

#[derive(Debug, Error)]
pub enum PostError {
    #[error("submitted form is invalid: {0}")]
    Invalid(FieldErrors),
    #[error("post {0} not found")]
    UnknownPost(Uuid),
    #[error("failed to store image: {0}")]
    Storage(#[from] MediaStorageError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Submitted post fields plus an optional new image.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub form: PostFormInput,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Updated(PostRecord),
    /// The caller is not the author; nothing was changed.
    NotAuthor,
}

/// Everything a client needs to render the post form.
#[derive(Debug, Clone, Serialize)]
pub struct PostFormContext {
    pub is_edit: bool,
    pub post: Option<PostRecord>,
    pub groups: Vec<GroupRecord>,
}

#[derive(Debug, Clone)]
pub enum EditAccess {
    Allowed(PostFormContext),
    NotAuthor,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writes: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    media: Arc<MediaStorage>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writes: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        media: Arc<MediaStorage>,
    ) -> Self {
        Self {
            posts,
            writes,
            groups,
            comments,
            media,
        }
    }

    pub async fn create_form(&self) -> Result<PostFormContext, PostError> {
        Ok(PostFormContext {
            is_edit: false,
            post: None,
            groups: self.groups.list_groups().await?,
        })
    }

    pub async fn edit_form(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> Result<EditAccess, PostError> {
        let post = self.load_post(id).await?;
        if post.author.id != principal.user_id {
            return Ok(EditAccess::NotAuthor);
        }
        Ok(EditAccess::Allowed(PostFormContext {
            is_edit: true,
            post: Some(post),
            groups: self.groups.list_groups().await?,
        }))
    }

    pub async fn create_post(
        &self,
        principal: &Principal,
        draft: PostDraft,
    ) -> Result<PostRecord, PostError> {
        let form = self.validate_draft(&draft).await?;
        let image = self.store_image(draft.image).await?;

        let created = self
            .writes
            .create_post(CreatePostParams {
                author_id: principal.user_id,
                text: form.text,
                group_id: form.group_id,
                image: image.clone(),
            })
            .await;

        let post = match created {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(image.as_deref()).await;
                return Err(err.into());
            }
        };

        metrics::counter!(telemetry::POSTS_CREATED_TOTAL).increment(1);
        info!(
            target = "application::posts::create_post",
            post_id = %post.id,
            author = %principal.username,
            text = post.short_text(),
            "post created"
        );
        Ok(post)
    }

    /// Replace text and group; a new image replaces the stored one, no image
    /// keeps it.
    pub async fn edit_post(
        &self,
        principal: &Principal,
        id: Uuid,
        draft: PostDraft,
    ) -> Result<EditOutcome, PostError> {
        let existing = self.load_post(id).await?;
        if existing.author.id != principal.user_id {
            info!(
                target = "application::posts::edit_post",
                post_id = %id,
                caller = %principal.username,
                "edit attempted by non-author"
            );
            return Ok(EditOutcome::NotAuthor);
        }

        let form = self.validate_draft(&draft).await?;
        let new_image = self.store_image(draft.image).await?;
        let image = new_image.clone().or(existing.image);

        let updated = self
            .writes
            .update_post(UpdatePostParams {
                id,
                text: form.text,
                group_id: form.group_id,
                image,
            })
            .await;

        match updated {
            Ok(post) => Ok(EditOutcome::Updated(post)),
            Err(err) => {
                self.discard_image(new_image.as_deref()).await;
                Err(err.into())
            }
        }
    }

    pub async fn add_comment(
        &self,
        principal: &Principal,
        post_id: Uuid,
        input: CommentFormInput,
    ) -> Result<CommentRecord, PostError> {
        let post = self.load_post(post_id).await?;
        let text = input.validate().map_err(PostError::Invalid)?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: principal.user_id,
                text,
            })
            .await?;
        Ok(comment)
    }

    async fn load_post(&self, id: Uuid) -> Result<PostRecord, PostError> {
        self.posts
            .find_post(id)
            .await?
            .ok_or(PostError::UnknownPost(id))
    }

    /// Field checks, group existence and image decoding, all reported together.
    async fn validate_draft(&self, draft: &PostDraft) -> Result<PostForm, PostError> {
        let (form, mut errors) = match draft.form.validate() {
            Ok(form) => (Some(form), FieldErrors::default()),
            Err(errors) => (None, errors),
        };

        if let Some(group_id) = form.as_ref().and_then(|form| form.group_id)
            && self.groups.find_group(group_id).await?.is_none()
        {
            errors.push("group", INVALID_CHOICE_MESSAGE);
        }

        if let Some(image) = &draft.image
            && inspect_image(&image.bytes).is_err()
        {
            errors.push("image", INVALID_IMAGE_MESSAGE);
        }

        match form {
            Some(form) if errors.is_empty() => Ok(form),
            _ => Err(PostError::Invalid(errors)),
        }
    }

    async fn store_image(&self, image: Option<ImageUpload>) -> Result<Option<String>, PostError> {
        let Some(image) = image else {
            return Ok(None);
        };
        let stored = self.media.store(&image.filename, image.bytes).await?;
        debug!(
            target = "application::posts::store_image",
            path = %stored.stored_path,
            size_bytes = stored.size_bytes,
            checksum = %stored.checksum,
            "stored post image"
        );
        Ok(Some(stored.stored_path))
    }

    async fn discard_image(&self, stored_path: Option<&str>) {
        let Some(stored_path) = stored_path else {
            return;
        };
        if let Err(err) = self.media.delete(stored_path).await {
            warn!(
                target = "application::posts::discard_image",
                path = stored_path,
                error = %err,
                "failed to remove orphaned image"
            );
        }
    }
}
