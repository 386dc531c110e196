use rusqlite::{params, Connection};

use crate::db;
use crate::error::{AppError, AppResult};
use crate::feed::posts::live_post_author;

pub fn is_liked(conn: &Connection, post_id: i64, user_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM likes WHERE post_id = ?1 AND user_id = ?2)",
        params![post_id, user_id],
        |r| r.get(0),
    )
}

fn like_count(conn: &Connection, post_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT like_count FROM posts WHERE id = ?1",
        params![post_id],
        |r| r.get(0),
    )
}

/// Like a post. Returns the new like count.
pub fn like(conn: &mut Connection, post_id: i64, user_id: i64) -> AppResult<i64> {
    let tx = db::write_tx(conn)?;
    if live_post_author(&tx, post_id)?.is_none() {
        return Err(AppError::not_found("Post not found"));
    }
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO likes (post_id, user_id) VALUES (?1, ?2)",
        params![post_id, user_id],
    )?;
    if inserted == 0 {
        return Err(AppError::bad_request("Post is already liked"));
    }
    tx.execute(
        "UPDATE posts SET like_count = like_count + 1 WHERE id = ?1",
        params![post_id],
    )?;
    let count = like_count(&tx, post_id)?;
    tx.commit()?;
    Ok(count)
}

/// Remove a like. Returns the new like count, never below zero.
pub fn unlike(conn: &mut Connection, post_id: i64, user_id: i64) -> AppResult<i64> {
    let tx = db::write_tx(conn)?;
    if live_post_author(&tx, post_id)?.is_none() {
        return Err(AppError::not_found("Post not found"));
    }
    let removed = tx.execute(
        "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
    )?;
    if removed == 0 {
        return Err(AppError::bad_request("Post is not liked"));
    }
    tx.execute(
        "UPDATE posts
         SET like_count = CASE WHEN like_count > 0 THEN like_count - 1 ELSE 0 END
         WHERE id = ?1",
        params![post_id],
    )?;
    let count = like_count(&tx, post_id)?;
    tx.commit()?;
    Ok(count)
}
