use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::error::DomainError;
use crate::domain::forms::{FieldErrors, required_text};
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async, validate_slug};

pub const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("slug `{0}` is already taken")]
    SlugTaken(String),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SlugAsyncError<RepoError>> for GroupError {
    fn from(error: SlugAsyncError<RepoError>) -> Self {
        match error {
            SlugAsyncError::Slug(err) => GroupError::Slug(err),
            SlugAsyncError::Predicate(err) => GroupError::Repo(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    pub async fn create_group(&self, cmd: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let mut errors = FieldErrors::default();
        let title = required_text(&mut errors, "title", &cmd.title);
        if title.chars().count() > MAX_TITLE_CHARS {
            errors.push(
                "title",
                format!("Ensure this value has at most {MAX_TITLE_CHARS} characters."),
            );
        }
        errors.into_result()?;

        let slug = match cmd.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => {
                let slug = validate_slug(slug)?.to_string();
                if self.groups.find_group_by_slug(&slug).await?.is_some() {
                    return Err(GroupError::SlugTaken(slug));
                }
                slug
            }
            _ => {
                let groups = self.groups.clone();
                generate_unique_slug_async(&title, |candidate| {
                    let groups = groups.clone();
                    let candidate = candidate.to_string();
                    async move {
                        groups
                            .find_group_by_slug(&candidate)
                            .await
                            .map(|found| found.is_none())
                    }
                })
                .await?
            }
        };

        let group = self
            .groups
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description: cmd.description.trim().to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::SlugTaken(slug),
                other => GroupError::Repo(other),
            })?;

        info!(
            target = "application::groups::create_group",
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }

    /// Posts of the group survive with their group reference cleared.
    pub async fn delete_group(&self, slug: &str) -> Result<GroupRecord, GroupError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or(DomainError::not_found("group"))?;

        if !self.groups.delete_group(group.id).await? {
            return Err(DomainError::not_found("group").into());
        }

        info!(
            target = "application::groups::delete_group",
            slug = %group.slug,
            "group deleted"
        );
        Ok(group)
    }
}
