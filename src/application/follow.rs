//! Directed follow graph between users.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::infra::telemetry;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("author `{0}` not found")]
    UnknownAuthor(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    /// Following oneself never creates an edge.
    SelfFollow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Removed,
    NotFollowing,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    pub async fn follow(&self, follower: Uuid, author: Uuid) -> Result<FollowOutcome, FollowError> {
        if follower == author {
            debug!(
                target = "application::follow::follow",
                user_id = %follower,
                "ignoring self-follow"
            );
            return Ok(FollowOutcome::SelfFollow);
        }

        if self.follows.follow_exists(follower, author).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        // A concurrent follow may still win the race; the insert collapses it.
        let created = self.follows.create_follow(follower, author).await?;
        if created {
            metrics::counter!(telemetry::FOLLOW_EDGES_CREATED_TOTAL).increment(1);
            info!(
                target = "application::follow::follow",
                user_id = %follower,
                author_id = %author,
                "follow edge created"
            );
            Ok(FollowOutcome::Created)
        } else {
            Ok(FollowOutcome::AlreadyFollowing)
        }
    }

    pub async fn unfollow(
        &self,
        follower: Uuid,
        author: Uuid,
    ) -> Result<UnfollowOutcome, FollowError> {
        if self.follows.delete_follow(follower, author).await? {
            metrics::counter!(telemetry::FOLLOW_EDGES_REMOVED_TOTAL).increment(1);
            info!(
                target = "application::follow::unfollow",
                user_id = %follower,
                author_id = %author,
                "follow edge removed"
            );
            Ok(UnfollowOutcome::Removed)
        } else {
            Ok(UnfollowOutcome::NotFollowing)
        }
    }

    pub async fn is_following(&self, follower: Uuid, author: Uuid) -> Result<bool, FollowError> {
        Ok(self.follows.follow_exists(follower, author).await?)
    }

    /// Authors `follower` currently follows. Read fresh on every call.
    pub async fn following_authors(&self, follower: Uuid) -> Result<BTreeSet<Uuid>, FollowError> {
        let authors = self.follows.list_followed_authors(follower).await?;
        Ok(authors.into_iter().collect())
    }

    pub async fn follow_username(
        &self,
        follower: Uuid,
        username: &str,
    ) -> Result<(UserRecord, FollowOutcome), FollowError> {
        let author = self.resolve_author(username).await?;
        let outcome = self.follow(follower, author.id).await?;
        Ok((author, outcome))
    }

    pub async fn unfollow_username(
        &self,
        follower: Uuid,
        username: &str,
    ) -> Result<(UserRecord, UnfollowOutcome), FollowError> {
        let author = self.resolve_author(username).await?;
        let outcome = self.unfollow(follower, author.id).await?;
        Ok((author, outcome))
    }

    pub async fn is_following_username(
        &self,
        follower: Uuid,
        username: &str,
    ) -> Result<bool, FollowError> {
        let author = self.resolve_author(username).await?;
        self.is_following(follower, author.id).await
    }

    async fn resolve_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
