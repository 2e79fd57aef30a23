use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::PostRecord;

/// Column list shared by every post query. `tag_ids` is aggregated from
/// `post_tags` and is never NULL.
pub(crate) const POST_COLUMNS: &str = "p.id, p.slug, p.title, p.markdown_source, p.rendered_html, \
     p.author_id, p.cover_image_url, p.created_at, p.updated_at, \
     ARRAY(SELECT pt.tag_id FROM post_tags pt WHERE pt.post_id = p.id ORDER BY pt.tag_id) AS tag_ids";

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) markdown_source: String,
    pub(crate) rendered_html: String,
    pub(crate) author_id: Uuid,
    pub(crate) cover_image_url: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
    pub(crate) tag_ids: Vec<Uuid>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            markdown_source: row.markdown_source,
            rendered_html: row.rendered_html,
            author_id: row.author_id,
            tag_ids: row.tag_ids,
            cover_image_url: row.cover_image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
