use rusqlite::{params, Connection, OptionalExtension};

use crate::db;
use crate::error::{AppError, AppResult};
use crate::feed::posts::live_post_author;

pub const MAX_COMMENT_CHARS: usize = 1000;

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub author_name: Option<String>,
    pub author_profile_image: Option<String>,
    pub content: String,
    pub created_at: String,
}

/// Trimmed comment text, or 400 when blank or too long.
pub fn validate_content(raw: &str) -> AppResult<&str> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::bad_request("Comment content is required"));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::bad_request(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(content)
}

/// Insert a comment and bump the post's counter atomically.
pub fn create_comment(
    conn: &mut Connection,
    post_id: i64,
    author_id: i64,
    raw_content: &str,
) -> AppResult<CommentRow> {
    let content = validate_content(raw_content)?;

    let tx = db::write_tx(conn)?;
    if live_post_author(&tx, post_id)?.is_none() {
        return Err(AppError::not_found("Post not found"));
    }
    tx.execute(
        "INSERT INTO comments (post_id, author_id, content) VALUES (?1, ?2, ?3)",
        params![post_id, author_id, content],
    )?;
    let comment_id = tx.last_insert_rowid();
    tx.execute(
        "UPDATE posts SET comment_count = comment_count + 1 WHERE id = ?1",
        params![post_id],
    )?;
    let row = find_comment(&tx, comment_id)?
        .ok_or_else(|| AppError::Internal("Inserted comment vanished".into()))?;
    tx.commit()?;

    tracing::debug!("Comment {} added to post {}", comment_id, post_id);
    Ok(row)
}

/// Soft-delete a comment. Only its author may do so.
pub fn delete_comment(conn: &mut Connection, comment_id: i64, user_id: i64) -> AppResult<()> {
    let tx = db::write_tx(conn)?;
    let comment = find_comment(&tx, comment_id)?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;
    if comment.author_id != user_id {
        return Err(AppError::forbidden("You can only delete your own comments"));
    }

    tx.execute(
        "UPDATE comments SET deleted_at = datetime('now'), status = 'deleted' WHERE id = ?1",
        params![comment_id],
    )?;
    tx.execute(
        "UPDATE posts
         SET comment_count = CASE WHEN comment_count > 0 THEN comment_count - 1 ELSE 0 END
         WHERE id = ?1",
        params![comment.post_id],
    )?;
    tx.commit()?;
    Ok(())
}

const COMMENT_SELECT: &str = "
    SELECT c.id, c.post_id, c.author_id, u.username, u.name, u.profile_image,
           c.content, c.created_at
    FROM comments c
    JOIN users u ON u.id = c.author_id";

fn map_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        author_name: row.get(4)?,
        author_profile_image: row.get(5)?,
        content: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn find_comment(conn: &Connection, comment_id: i64) -> rusqlite::Result<Option<CommentRow>> {
    conn.query_row(
        &format!(
            "{} WHERE c.id = ?1 AND c.deleted_at IS NULL",
            COMMENT_SELECT
        ),
        params![comment_id],
        map_comment,
    )
    .optional()
}

/// Live comments of a post, oldest first.
pub fn list_comments(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<CommentRow>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE c.post_id = ?1 AND c.deleted_at IS NULL
         ORDER BY c.created_at ASC, c.id ASC",
        COMMENT_SELECT
    ))?;
    let comments = stmt
        .query_map(params![post_id], map_comment)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(comments)
}
