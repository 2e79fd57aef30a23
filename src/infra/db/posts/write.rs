use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::application::repos::{CreatePostParams, PostChanges, PostsWriteRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::infra::db::map_sqlx_error;

use super::PostgresRepositories;
use super::read::fetch_post_by_id;

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            slug,
            title,
            markdown_source,
            rendered_html,
            author_id,
            tag_ids,
            cover_image_url,
        } = params;

        let id = Uuid::new_v4();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO posts (
                id, slug, title, markdown_source, rendered_html, author_id, cover_image_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(slug)
        .bind(title)
        .bind(markdown_source)
        .bind(rendered_html)
        .bind(author_id)
        .bind(cover_image_url)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        link_tags(&mut tx, id, &tag_ids).await?;

        let post = fetch_post_by_id(&mut *tx, id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(post)
    }

    async fn update_post_partial(
        &self,
        id: Uuid,
        changes: PostChanges,
    ) -> Result<PostRecord, RepoError> {
        changes.check_body_pairing()?;
        let PostChanges {
            slug,
            title,
            markdown_source,
            rendered_html,
            tag_ids,
            cover_image_url,
        } = changes;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE posts SET updated_at = now()");
        if let Some(slug) = slug {
            qb.push(", slug = ");
            qb.push_bind(slug);
        }
        if let Some(title) = title {
            qb.push(", title = ");
            qb.push_bind(title);
        }
        if let Some(markdown_source) = markdown_source {
            qb.push(", markdown_source = ");
            qb.push_bind(markdown_source);
        }
        if let Some(rendered_html) = rendered_html {
            qb.push(", rendered_html = ");
            qb.push_bind(rendered_html);
        }
        if let Some(cover_image_url) = cover_image_url {
            qb.push(", cover_image_url = ");
            qb.push_bind(cover_image_url);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);

        let updated = qb
            .build()
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if updated.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        if let Some(tag_ids) = tag_ids {
            sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            link_tags(&mut tx, id, &tag_ids).await?;
        }

        let post = fetch_post_by_id(&mut *tx, id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

async fn link_tags(conn: &mut PgConnection, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO post_tags (post_id, tag_id) SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
    )
    .bind(post_id)
    .bind(tag_ids)
    .execute(conn)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}
