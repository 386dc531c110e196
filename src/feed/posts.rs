use rusqlite::{params, Connection, OptionalExtension};

use crate::db;
use crate::db::models::PostType;
use crate::error::{AppError, AppResult};

pub const MAX_IMAGES_PER_POST: usize = 10;

pub struct NewPost<'a> {
    pub author_id: i64,
    pub post_type: PostType,
    pub content: Option<&'a str>,
    pub is_senior_mode: bool,
    pub image_urls: &'a [String],
    pub video_url: Option<&'a str>,
    pub thumbnail_url: Option<&'a str>,
}

/// Insert a post and its images in one transaction. Returns the post id.
pub fn create_post(conn: &mut Connection, post: &NewPost<'_>) -> AppResult<i64> {
    let tx = db::write_tx(conn)?;
    tx.execute(
        "INSERT INTO posts (author_id, content, post_type, video_url, thumbnail_url, is_senior_mode)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            post.author_id,
            post.content,
            post.post_type.as_str(),
            post.video_url,
            post.thumbnail_url,
            post.is_senior_mode,
        ],
    )?;
    let post_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO post_images (post_id, image_url, position) VALUES (?1, ?2, ?3)",
        )?;
        for (position, url) in post.image_urls.iter().enumerate() {
            stmt.execute(params![post_id, url, position as i64])?;
        }
    }

    tx.commit()?;
    Ok(post_id)
}

/// Author of a post that has not been deleted.
pub fn live_post_author(conn: &Connection, post_id: i64) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT author_id FROM posts WHERE id = ?1 AND deleted_at IS NULL",
        params![post_id],
        |r| r.get(0),
    )
    .optional()
}

/// 404 when the post is missing or deleted, 403 when `user_id` is not its author.
pub fn ensure_author(conn: &Connection, post_id: i64, user_id: i64) -> AppResult<()> {
    match live_post_author(conn, post_id)? {
        None => Err(AppError::not_found("Post not found")),
        Some(author) if author != user_id => {
            Err(AppError::forbidden("You can only modify your own posts"))
        }
        Some(_) => Ok(()),
    }
}

pub fn update_content(
    conn: &Connection,
    post_id: i64,
    user_id: i64,
    content: &str,
) -> AppResult<()> {
    ensure_author(conn, post_id, user_id)?;
    conn.execute(
        "UPDATE posts SET content = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![content, post_id],
    )?;
    Ok(())
}

pub fn soft_delete(conn: &Connection, post_id: i64, user_id: i64) -> AppResult<()> {
    ensure_author(conn, post_id, user_id)?;
    conn.execute(
        "UPDATE posts SET deleted_at = datetime('now'), updated_at = datetime('now')
         WHERE id = ?1",
        params![post_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::feed::query::get_post;

    fn setup() -> (tempfile::TempDir, crate::state::DbPool, i64, i64) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("t.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (signup_mode, username, phone) VALUES ('phone', 'a', '1'), ('phone', 'b', '2')",
            [],
        )
        .unwrap();
        (tmp, pool, 1, 2)
    }

    #[test]
    fn create_post_stores_images_in_order() {
        let (_tmp, pool, author, _) = setup();
        let mut conn = pool.get().unwrap();
        let urls = vec!["/uploads/images/1.jpg".to_string(), "/uploads/images/2.jpg".to_string()];
        let id = create_post(
            &mut conn,
            &NewPost {
                author_id: author,
                post_type: PostType::Feed,
                content: Some("first"),
                is_senior_mode: true,
                image_urls: &urls,
                video_url: None,
                thumbnail_url: None,
            },
        )
        .unwrap();

        let item = get_post(&conn, author, id).unwrap().unwrap();
        assert_eq!(item.image_urls, urls);
        assert!(item.is_senior_mode);
        assert_eq!(item.content.as_deref(), Some("first"));
    }

    #[test]
    fn only_author_may_edit_or_delete() {
        let (_tmp, pool, author, other) = setup();
        let mut conn = pool.get().unwrap();
        let id = create_post(
            &mut conn,
            &NewPost {
                author_id: author,
                post_type: PostType::Feed,
                content: Some("x"),
                is_senior_mode: false,
                image_urls: &[],
                video_url: None,
                thumbnail_url: None,
            },
        )
        .unwrap();

        assert!(matches!(
            update_content(&conn, id, other, "hijack"),
            Err(AppError::Forbidden(_))
        ));
        update_content(&conn, id, author, "edited").unwrap();
        soft_delete(&conn, id, author).unwrap();
        assert!(matches!(
            soft_delete(&conn, id, author),
            Err(AppError::NotFound(_))
        ));
    }
}
