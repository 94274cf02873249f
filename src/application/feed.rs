//! Post listings: the personal follow feed plus the index, group, profile
//! and detail views.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::follow::{FollowError, FollowService};
use crate::application::pagination::{Page, Paginator};
use crate::application::repos::{
    CommentsRepo, GroupsRepo, PostScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("group `{0}` not found")]
    UnknownGroup(String),
    #[error("author `{0}` not found")]
    UnknownAuthor(String),
    #[error("post {0} not found")]
    UnknownPost(Uuid),
    #[error(transparent)]
    Follow(#[from] FollowError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupPage {
    pub group: GroupRecord,
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfilePage {
    pub author: UserRecord,
    pub post_count: u64,
    /// Always `false` for anonymous viewers.
    pub following: bool,
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub post: PostRecord,
    pub author_post_count: u64,
    pub comments: Vec<CommentRecord>,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: FollowService,
    paginator: Paginator,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: FollowService,
        paginator: Paginator,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            comments,
            follows,
            paginator,
        }
    }

    pub fn paginator(&self) -> Paginator {
        self.paginator
    }

    /// Posts by every author `viewer` follows, newest first. Following nobody
    /// yields an empty feed.
    pub async fn compute_feed(&self, viewer: Uuid) -> Result<Vec<PostRecord>, FeedError> {
        let authors = self.follows.following_authors(viewer).await?;
        if authors.is_empty() {
            return Ok(Vec::new());
        }
        let authors: Vec<Uuid> = authors.into_iter().collect();
        Ok(self.posts.posts_by_authors(&authors).await?)
    }

    /// One page of the personal feed. Always a page, possibly empty.
    pub async fn follow_page(
        &self,
        viewer: Uuid,
        requested: u64,
    ) -> Result<Page<PostRecord>, FeedError> {
        let feed = self.compute_feed(viewer).await?;
        Ok(self.paginator.paginate(feed, requested))
    }

    pub async fn index_page(&self, requested: u64) -> Result<Page<PostRecord>, FeedError> {
        self.scoped_page(&PostScope::All, requested).await
    }

    pub async fn group_page(&self, slug: &str, requested: u64) -> Result<GroupPage, FeedError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))?;
        let page = self.scoped_page(&PostScope::Group(group.id), requested).await?;
        Ok(GroupPage { group, page })
    }

    pub async fn profile_page(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        requested: u64,
    ) -> Result<ProfilePage, FeedError> {
        let author = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownAuthor(username.to_string()))?;

        let page = self
            .scoped_page(&PostScope::Author(author.id), requested)
            .await?;
        let following = match viewer {
            Some(viewer) => self.follows.is_following(viewer, author.id).await?,
            None => false,
        };

        Ok(ProfilePage {
            post_count: page.count,
            author,
            following,
            page,
        })
    }

    pub async fn post_detail(&self, id: Uuid) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_post(id)
            .await?
            .ok_or(FeedError::UnknownPost(id))?;
        let author_post_count = self
            .posts
            .count_posts(&PostScope::Author(post.author.id))
            .await?;
        let comments = self.comments.list_comments(post.id).await?;

        Ok(PostDetail {
            post,
            author_post_count,
            comments,
        })
    }

    async fn scoped_page(
        &self,
        scope: &PostScope,
        requested: u64,
    ) -> Result<Page<PostRecord>, FeedError> {
        let count = self.posts.count_posts(scope).await?;
        let window = self.paginator.window(count, requested);
        let items = if count == 0 {
            Vec::new()
        } else {
            self.posts.list_posts(scope, window).await?
        };
        Ok(Page::from_window(window, items))
    }
}
