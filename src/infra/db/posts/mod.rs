//! Post persistence. Every read joins the author and the optional group so
//! listings never issue per-row lookups.

mod read;
mod write;

use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::PostScope;
use crate::domain::entities::{AuthorRef, GroupRef, PostRecord};

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.image, \
    u.id AS author_id, u.username AS author_username, \
    g.id AS group_id, g.slug AS group_slug, g.title AS group_title \
    FROM posts p \
    INNER JOIN users u ON u.id = p.author_id \
    LEFT JOIN groups g ON g.id = p.group_id";

const POST_ORDER: &str = " ORDER BY p.pub_date DESC, p.id DESC";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    text: String,
    pub_date: OffsetDateTime,
    image: Option<String>,
    author_id: Uuid,
    author_username: String,
    group_id: Option<Uuid>,
    group_slug: Option<String>,
    group_title: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
            _ => None,
        };

        Self {
            id: row.id,
            text: row.text,
            pub_date: row.pub_date,
            author: AuthorRef {
                id: row.author_id,
                username: row.author_username,
            },
            group,
            image: row.image,
        }
    }
}

fn push_scope<'q>(qb: &mut QueryBuilder<'q, Postgres>, scope: &'q PostScope) {
    match scope {
        PostScope::All => {}
        PostScope::Group(group_id) => {
            qb.push(" WHERE p.group_id = ");
            qb.push_bind(*group_id);
        }
        PostScope::Author(author_id) => {
            qb.push(" WHERE p.author_id = ");
            qb.push_bind(*author_id);
        }
        PostScope::Authors(authors) => {
            qb.push(" WHERE p.author_id = ANY(");
            qb.push_bind(authors.as_slice());
            qb.push(")");
        }
    }
}
