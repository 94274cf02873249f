//! In-memory repositories and service wiring shared by integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use yatube::{
    application::{
        auth::{Principal, UserTokenService},
        feed::FeedService,
        follow::FollowService,
        groups::GroupService,
        pagination::{PageWindow, Paginator},
        posts::PostService,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateTokenParams, FollowsRepo, GroupsRepo, HealthRepo, PostScope, PostsRepo,
            PostsWriteRepo, RepoError, TokensRepo, UpdatePostParams, UsersRepo,
        },
        users::UserService,
    },
    cache::{CacheConfig, ResponseCache},
    domain::entities::{
        AuthorRef, CommentRecord, FollowRecord, GroupRecord, GroupRef, PostRecord, UserRecord,
        UserTokenRecord,
    },
    infra::{http::HttpState, uploads::MediaStorage},
};

#[derive(Debug, Clone)]
struct StoredPost {
    id: Uuid,
    text: String,
    pub_date: OffsetDateTime,
    author_id: Uuid,
    group_id: Option<Uuid>,
    image: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredComment {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    text: String,
    created: OffsetDateTime,
}

#[derive(Default)]
struct State {
    users: Vec<UserRecord>,
    tokens: Vec<UserTokenRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<StoredComment>,
    follows: Vec<FollowRecord>,
    ticks: i64,
}

impl State {
    /// Strictly increasing timestamps so ordering never depends on clock resolution.
    fn next_instant(&mut self) -> OffsetDateTime {
        self.ticks += 1;
        OffsetDateTime::UNIX_EPOCH + Duration::days(20_000) + Duration::seconds(self.ticks)
    }

    fn author_ref(&self, id: Uuid) -> Result<AuthorRef, RepoError> {
        self.users
            .iter()
            .find(|user| user.id == id)
            .map(|user| AuthorRef {
                id: user.id,
                username: user.username.clone(),
            })
            .ok_or_else(|| RepoError::Integrity {
                message: format!("user {id} does not exist"),
            })
    }

    fn to_record(&self, post: &StoredPost) -> Result<PostRecord, RepoError> {
        let group = post.group_id.and_then(|group_id| {
            self.groups
                .iter()
                .find(|group| group.id == group_id)
                .map(|group| GroupRef {
                    id: group.id,
                    slug: group.slug.clone(),
                    title: group.title.clone(),
                })
        });
        Ok(PostRecord {
            id: post.id,
            text: post.text.clone(),
            pub_date: post.pub_date,
            author: self.author_ref(post.author_id)?,
            group,
            image: post.image.clone(),
        })
    }

    fn scoped(&self, scope: &PostScope) -> Vec<&StoredPost> {
        let mut posts: Vec<&StoredPost> = self
            .posts
            .iter()
            .filter(|post| match scope {
                PostScope::All => true,
                PostScope::Group(group_id) => post.group_id == Some(*group_id),
                PostScope::Author(author_id) => post.author_id == *author_id,
                PostScope::Authors(authors) => authors.contains(&post.author_id),
            })
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }

    fn check_group(&self, group_id: Option<Uuid>) -> Result<(), RepoError> {
        match group_id {
            Some(id) if !self.groups.iter().any(|group| group.id == id) => {
                Err(RepoError::Integrity {
                    message: format!("group {id} does not exist"),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Repository double with the same referential behaviour as the schema:
/// deleting a user cascades, deleting a group clears post references.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock")
    }

    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }

    pub fn follow_count(&self) -> usize {
        self.lock().follows.len()
    }

    pub fn token_count(&self) -> usize {
        self.lock().tokens.len()
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, username: &str) -> Result<UserRecord, RepoError> {
        let mut state = self.lock();
        if state.users.iter().any(|user| user.username == username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            created_at: state.next_instant(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.lock();
        let before = state.users.len();
        state.users.retain(|user| user.id != id);
        if state.users.len() == before {
            return Ok(false);
        }

        let removed_posts: Vec<Uuid> = state
            .posts
            .iter()
            .filter(|post| post.author_id == id)
            .map(|post| post.id)
            .collect();
        state.posts.retain(|post| post.author_id != id);
        state.comments.retain(|comment| {
            comment.author_id != id && !removed_posts.contains(&comment.post_id)
        });
        state
            .follows
            .retain(|follow| follow.user_id != id && follow.author_id != id);
        state.tokens.retain(|token| token.user_id != id);
        Ok(true)
    }
}

#[async_trait]
impl TokensRepo for MemoryStore {
    async fn create_token(&self, params: CreateTokenParams) -> Result<UserTokenRecord, RepoError> {
        let mut state = self.lock();
        let record = UserTokenRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            created_at: state.next_instant(),
            last_used_at: None,
        };
        state.tokens.push(record.clone());
        Ok(record)
    }

    async fn find_token_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<UserTokenRecord>, RepoError> {
        Ok(self
            .lock()
            .tokens
            .iter()
            .find(|token| token.prefix == prefix)
            .cloned())
    }

    async fn touch_token(&self, id: Uuid, used_at: OffsetDateTime) -> Result<(), RepoError> {
        if let Some(token) = self.lock().tokens.iter_mut().find(|token| token.id == id) {
            token.last_used_at = Some(used_at);
        }
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.lock();
        if state.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: Uuid::new_v4(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.slug.cmp(&b.slug)));
        Ok(groups)
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.lock().groups.iter().find(|group| group.id == id).cloned())
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn delete_group(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.lock();
        let before = state.groups.len();
        state.groups.retain(|group| group.id != id);
        if state.groups.len() == before {
            return Ok(false);
        }
        for post in state.posts.iter_mut().filter(|post| post.group_id == Some(id)) {
            post.group_id = None;
        }
        Ok(true)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        scope: &PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.lock();
        let offset = usize::try_from(window.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(window.limit()).unwrap_or(usize::MAX);
        state
            .scoped(scope)
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|post| state.to_record(post))
            .collect()
    }

    async fn count_posts(&self, scope: &PostScope) -> Result<u64, RepoError> {
        Ok(self.lock().scoped(scope).len() as u64)
    }

    async fn posts_by_authors(&self, authors: &[Uuid]) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.lock();
        state
            .scoped(&PostScope::Authors(authors.to_vec()))
            .into_iter()
            .map(|post| state.to_record(post))
            .collect()
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let state = self.lock();
        state
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| state.to_record(post))
            .transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock();
        state.author_ref(params.author_id)?;
        state.check_group(params.group_id)?;
        let post = StoredPost {
            id: Uuid::new_v4(),
            text: params.text,
            pub_date: state.next_instant(),
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        state.posts.push(post.clone());
        state.to_record(&post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock();
        state.check_group(params.group_id)?;
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        let post = post.clone();
        state.to_record(&post)
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.lock();
        let author = state.author_ref(params.author_id)?;
        if !state.posts.iter().any(|post| post.id == params.post_id) {
            return Err(RepoError::Integrity {
                message: format!("post {} does not exist", params.post_id),
            });
        }
        let stored = StoredComment {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created: state.next_instant(),
        };
        state.comments.push(stored.clone());
        Ok(CommentRecord {
            id: stored.id,
            post_id: stored.post_id,
            author,
            text: stored.text,
            created: stored.created,
        })
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.lock();
        let mut comments: Vec<&StoredComment> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        comments.sort_by_key(|comment| comment.created);
        comments
            .into_iter()
            .map(|comment| {
                Ok(CommentRecord {
                    id: comment.id,
                    post_id: comment.post_id,
                    author: state.author_ref(comment.author_id)?,
                    text: comment.text.clone(),
                    created: comment.created,
                })
            })
            .collect()
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn create_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.lock();
        if state
            .follows
            .iter()
            .any(|follow| follow.user_id == user_id && follow.author_id == author_id)
        {
            return Ok(false);
        }
        state.author_ref(user_id)?;
        state.author_ref(author_id)?;
        let created_at = state.next_instant();
        state.follows.push(FollowRecord {
            id: Uuid::new_v4(),
            user_id,
            author_id,
            created_at,
        });
        Ok(true)
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.lock();
        let before = state.follows.len();
        state
            .follows
            .retain(|follow| !(follow.user_id == user_id && follow.author_id == author_id));
        Ok(state.follows.len() != before)
    }

    async fn follow_exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .any(|follow| follow.user_id == user_id && follow.author_id == author_id))
    }

    async fn list_followed_authors(&self, user_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .filter(|follow| follow.user_id == user_id)
            .map(|follow| follow.author_id)
            .collect())
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Every service wired against one [`MemoryStore`].
pub struct Services {
    pub store: Arc<MemoryStore>,
    pub users: UserService,
    pub groups: GroupService,
    pub tokens: UserTokenService,
    pub follows: FollowService,
    pub feed: FeedService,
    pub posts: PostService,
    pub media: Arc<MediaStorage>,
}

pub fn services(media_root: &Path, page_size: u32) -> Services {
    let store = MemoryStore::new();
    let media = Arc::new(MediaStorage::new(media_root.to_path_buf()).expect("media root"));

    let follows = FollowService::new(store.clone(), store.clone());
    let feed = FeedService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        follows.clone(),
        Paginator::new(page_size),
    );
    let posts = PostService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        media.clone(),
    );

    Services {
        users: UserService::new(store.clone()),
        groups: GroupService::new(store.clone()),
        tokens: UserTokenService::new(store.clone(), store.clone()),
        follows,
        feed,
        posts,
        media,
        store,
    }
}

impl Services {
    pub async fn user(&self, username: &str) -> UserRecord {
        self.users.create_user(username).await.expect("create user")
    }

    pub async fn post(&self, author: &UserRecord, text: &str) -> PostRecord {
        self.post_in_group(author, text, None).await
    }

    pub async fn post_in_group(
        &self,
        author: &UserRecord,
        text: &str,
        group_id: Option<Uuid>,
    ) -> PostRecord {
        PostsWriteRepo::create_post(
            self.store.as_ref(),
            CreatePostParams {
                author_id: author.id,
                text: text.to_string(),
                group_id,
                image: None,
            },
        )
        .await
        .expect("create post")
    }

    pub fn http_state(&self, cache: CacheConfig) -> HttpState {
        HttpState {
            feed: Arc::new(self.feed.clone()),
            follows: Arc::new(self.follows.clone()),
            posts: Arc::new(self.posts.clone()),
            tokens: Arc::new(self.tokens.clone()),
            media: self.media.clone(),
            health: self.store.clone(),
            cache: Arc::new(ResponseCache::new(cache)),
            login_url: Arc::from("/auth/login/"),
            max_request_bytes: 1024 * 1024,
        }
    }
}

pub fn principal(user: &UserRecord) -> Principal {
    Principal {
        user_id: user.id,
        username: user.username.clone(),
    }
}

/// 1x1 GIF accepted by the image validator.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x21, 0xf9, 0x04,
    0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02,
    0x01, 0x00, 0x00,
];
