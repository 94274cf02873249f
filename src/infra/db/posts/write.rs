use async_trait::async_trait;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::{
    application::repos::{CreatePostParams, PostsWriteRepo, RepoError, UpdatePostParams},
    domain::entities::PostRecord,
    infra::db::{PostgresRepositories, map_sqlx_error},
};

use super::{POST_SELECT, PostRow};

impl PostgresRepositories {
    async fn load_post_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
    ) -> Result<PostRecord, RepoError> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO posts (id, text, author_id, group_id, image)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&params.text)
        .bind(params.author_id)
        .bind(params.group_id)
        .bind(params.image.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let post = Self::load_post_in_tx(&mut tx, id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            r#"
            UPDATE posts
            SET text = $2, group_id = $3, image = $4
            WHERE id = $1
            "#,
        )
        .bind(params.id)
        .bind(&params.text)
        .bind(params.group_id)
        .bind(params.image.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        let post = Self::load_post_in_tx(&mut tx, params.id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(post)
    }
}
