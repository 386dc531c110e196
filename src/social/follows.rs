use rusqlite::{params, Connection};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::accounts;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FollowUser {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub profile_image: Option<String>,
    pub followed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

pub fn is_following(conn: &Connection, follower_id: i64, followee_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM user_follows WHERE follower_id = ?1 AND followee_id = ?2)",
        params![follower_id, followee_id],
        |r| r.get(0),
    )
}

pub fn follow(conn: &Connection, follower_id: i64, followee_id: i64) -> AppResult<()> {
    if follower_id == followee_id {
        return Err(AppError::bad_request("You cannot follow yourself"));
    }
    if accounts::find_active_by_id(conn, followee_id)?.is_none() {
        return Err(AppError::not_found("User not found"));
    }
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_follows (follower_id, followee_id) VALUES (?1, ?2)",
        params![follower_id, followee_id],
    )?;
    if inserted == 0 {
        return Err(AppError::bad_request("Already following this user"));
    }
    Ok(())
}

pub fn unfollow(conn: &Connection, follower_id: i64, followee_id: i64) -> AppResult<()> {
    let removed = conn.execute(
        "DELETE FROM user_follows WHERE follower_id = ?1 AND followee_id = ?2",
        params![follower_id, followee_id],
    )?;
    if removed == 0 {
        return Err(AppError::not_found("Not following this user"));
    }
    Ok(())
}

/// Drop `follower_id` from the followers of `user_id`.
pub fn remove_follower(conn: &Connection, user_id: i64, follower_id: i64) -> AppResult<()> {
    let removed = conn.execute(
        "DELETE FROM user_follows WHERE follower_id = ?1 AND followee_id = ?2",
        params![follower_id, user_id],
    )?;
    if removed == 0 {
        return Err(AppError::not_found("This user is not following you"));
    }
    Ok(())
}

pub fn counts(conn: &Connection, user_id: i64) -> rusqlite::Result<FollowCounts> {
    conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM user_follows WHERE followee_id = ?1),
            (SELECT COUNT(*) FROM user_follows WHERE follower_id = ?1)",
        params![user_id],
        |r| {
            Ok(FollowCounts {
                followers: r.get(0)?,
                following: r.get(1)?,
            })
        },
    )
}

fn list(conn: &Connection, sql: &str, user_id: i64) -> rusqlite::Result<Vec<FollowUser>> {
    let mut stmt = conn.prepare(sql)?;
    let users = stmt
        .query_map(params![user_id], |row| {
            Ok(FollowUser {
                id: row.get(0)?,
                username: row.get(1)?,
                name: row.get(2)?,
                profile_image: row.get(3)?,
                followed_at: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

/// Accounts following `user_id`, most recent first.
pub fn list_followers(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<FollowUser>> {
    list(
        conn,
        "SELECT u.id, u.username, u.name, u.profile_image, f.created_at
         FROM user_follows f
         JOIN users u ON u.id = f.follower_id
         WHERE f.followee_id = ?1 AND u.status = 'active'
         ORDER BY f.created_at DESC, f.id DESC",
        user_id,
    )
}

/// Accounts `user_id` follows, most recent first.
pub fn list_following(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<FollowUser>> {
    list(
        conn,
        "SELECT u.id, u.username, u.name, u.profile_image, f.created_at
         FROM user_follows f
         JOIN users u ON u.id = f.followee_id
         WHERE f.follower_id = ?1 AND u.status = 'active'
         ORDER BY f.created_at DESC, f.id DESC",
        user_id,
    )
}
