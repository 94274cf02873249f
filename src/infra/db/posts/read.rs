use async_trait::async_trait;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::{
    application::{
        pagination::PageWindow,
        repos::{PostScope, PostsRepo, RepoError},
    },
    domain::entities::PostRecord,
    infra::db::{
        PostgresRepositories, map_sqlx_error,
        util::{convert_count, convert_window},
    },
};

use super::{POST_ORDER, POST_SELECT, PostRow, push_scope};

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        scope: &PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let limit = convert_window(window.limit())?;
        let offset = convert_window(window.offset())?;

        let mut qb = QueryBuilder::new(POST_SELECT);
        push_scope(&mut qb, scope);
        qb.push(POST_ORDER);
        qb.push(" LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn count_posts(&self, scope: &PostScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p");
        push_scope(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        convert_count(count)
    }

    async fn posts_by_authors(&self, authors: &[Uuid]) -> Result<Vec<PostRecord>, RepoError> {
        if authors.is_empty() {
            return Ok(Vec::new());
        }

        let scope = PostScope::Authors(authors.to_vec());
        let mut qb = QueryBuilder::new(POST_SELECT);
        push_scope(&mut qb, &scope);
        qb.push(POST_ORDER);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}
