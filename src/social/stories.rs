use std::cmp::Reverse;
use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::MediaType;
use crate::error::{AppError, AppResult};
use crate::feed::relative_time::parse_and_format_time;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryAuthor {
    pub username: String,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryItem {
    pub id: i64,
    pub image_url: String,
    pub media_type: String,
    pub created_at: String,
    pub timestamp: String,
    pub is_viewed: bool,
}

/// All live stories of one author.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryGroup {
    pub user_id: i64,
    pub author: StoryAuthor,
    pub items: Vec<StoryItem>,
    pub has_unviewed: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryViewer {
    pub user_id: i64,
    pub user_name: String,
    pub profile_image_url: Option<String>,
    pub viewed_at: String,
    pub viewed_at_time: String,
}

pub fn create_story(
    conn: &Connection,
    user_id: i64,
    media_url: &str,
    media_type: MediaType,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO stories (user_id, media_url, media_type) VALUES (?1, ?2, ?3)",
        params![user_id, media_url, media_type.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Owner of a non-deleted story, and whether it is still within its 24 hours.
fn find_story(conn: &Connection, story_id: i64) -> rusqlite::Result<Option<(i64, bool)>> {
    conn.query_row(
        "SELECT user_id, expires_at > datetime('now')
         FROM stories WHERE id = ?1 AND deleted_at IS NULL",
        params![story_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()
}

pub fn is_mine(conn: &Connection, story_id: i64, user_id: i64) -> AppResult<bool> {
    let (owner, _) = find_story(conn, story_id)?
        .ok_or_else(|| AppError::not_found("Story not found"))?;
    Ok(owner == user_id)
}

/// Record that `viewer_id` watched a live story. Repeat and self views are no-ops.
pub fn record_view(conn: &Connection, story_id: i64, viewer_id: i64) -> AppResult<()> {
    let (owner, live) = find_story(conn, story_id)?
        .ok_or_else(|| AppError::not_found("Story not found"))?;
    if !live {
        return Err(AppError::not_found("Story has expired"));
    }
    if owner == viewer_id {
        return Ok(());
    }
    conn.execute(
        "INSERT OR IGNORE INTO story_views (story_id, viewer_id) VALUES (?1, ?2)",
        params![story_id, viewer_id],
    )?;
    Ok(())
}

/// Viewers of a story, newest first. Only the owner may ask.
pub fn list_viewers(conn: &Connection, story_id: i64, requester: i64) -> AppResult<Vec<StoryViewer>> {
    let (owner, _) = find_story(conn, story_id)?
        .ok_or_else(|| AppError::not_found("Story not found"))?;
    if owner != requester {
        return Err(AppError::forbidden("Only the story owner can see its viewers"));
    }

    let mut stmt = conn.prepare(
        "SELECT u.id, COALESCE(u.name, u.username), u.profile_image, v.viewed_at
         FROM story_views v
         JOIN users u ON u.id = v.viewer_id
         WHERE v.story_id = ?1
         ORDER BY v.viewed_at DESC, v.id DESC",
    )?;
    let viewers = stmt
        .query_map(params![story_id], |row| {
            let viewed_at: String = row.get(3)?;
            Ok(StoryViewer {
                user_id: row.get(0)?,
                user_name: row.get(1)?,
                profile_image_url: row.get(2)?,
                viewed_at_time: parse_and_format_time(&viewed_at),
                viewed_at,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(viewers)
}

/// Live stories of the viewer and the accounts they follow, grouped per author.
/// The viewer's own group comes first, then groups with the most recent story.
pub fn list_story_groups(conn: &Connection, viewer_id: i64) -> rusqlite::Result<Vec<StoryGroup>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.user_id, u.username, u.profile_image, s.media_url, s.media_type,
                s.created_at,
                EXISTS(SELECT 1 FROM story_views v WHERE v.story_id = s.id AND v.viewer_id = ?1)
         FROM stories s
         JOIN users u ON u.id = s.user_id
         WHERE s.deleted_at IS NULL
           AND s.expires_at > datetime('now')
           AND s.user_id IN (
                SELECT ?1 UNION SELECT followee_id FROM user_follows WHERE follower_id = ?1)
         ORDER BY s.created_at ASC, s.id ASC",
    )?;

    let rows = stmt.query_map(params![viewer_id], |row| {
        let user_id: i64 = row.get(1)?;
        let created_at: String = row.get(6)?;
        let viewed: bool = row.get(7)?;
        Ok((
            user_id,
            StoryAuthor {
                username: row.get(2)?,
                profile_image_url: row.get(3)?,
            },
            StoryItem {
                id: row.get(0)?,
                image_url: row.get(4)?,
                media_type: row.get(5)?,
                timestamp: parse_and_format_time(&created_at),
                created_at,
                // Own stories never need a "new" ring
                is_viewed: viewed || user_id == viewer_id,
            },
        ))
    })?;

    let mut groups: Vec<StoryGroup> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();
    for row in rows {
        let (user_id, author, item) = row?;
        let slot = *index.entry(user_id).or_insert_with(|| {
            groups.push(StoryGroup {
                user_id,
                author,
                items: Vec::new(),
                has_unviewed: false,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.has_unviewed |= !item.is_viewed;
        group.items.push(item);
    }

    groups.sort_by_key(|g| {
        let latest = g
            .items
            .last()
            .map(|i| (i.created_at.clone(), i.id))
            .unwrap_or_default();
        (g.user_id != viewer_id, Reverse(latest))
    });
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup() -> (tempfile::TempDir, crate::state::DbPool) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("t.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (signup_mode, username, phone) VALUES ('phone', 'me', '1');
             INSERT INTO users (signup_mode, username, phone) VALUES ('phone', 'friend', '2');
             INSERT INTO users (signup_mode, username, phone) VALUES ('phone', 'other', '3');
             INSERT INTO users (signup_mode, username, phone) VALUES ('phone', 'stranger', '4');
             INSERT INTO user_follows (follower_id, followee_id) VALUES (1, 2);
             INSERT INTO user_follows (follower_id, followee_id) VALUES (1, 3);",
        )
        .unwrap();
        (tmp, pool)
    }

    fn story_at(conn: &Connection, user_id: i64, created_at: &str) -> i64 {
        conn.execute(
            "INSERT INTO stories (user_id, media_url, created_at) VALUES (?1, '/s.jpg', ?2)",
            params![user_id, created_at],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn groups_put_viewer_first_then_most_recent() {
        let (_tmp, pool) = setup();
        let conn = pool.get().unwrap();
        story_at(&conn, 2, "2025-01-01 00:00:01");
        story_at(&conn, 3, "2025-01-01 00:00:05");
        story_at(&conn, 1, "2025-01-01 00:00:00");
        story_at(&conn, 2, "2025-01-01 00:00:02");
        story_at(&conn, 4, "2025-01-01 00:00:09");

        let groups = list_story_groups(&conn, 1).unwrap();
        let order: Vec<i64> = groups.iter().map(|g| g.user_id).collect();
        assert_eq!(order, vec![1, 3, 2]);
        assert_eq!(groups[2].items.len(), 2);
        assert!(groups[2].items[0].created_at < groups[2].items[1].created_at);
        assert!(!groups[0].has_unviewed);
        assert!(groups[1].has_unviewed);
    }

    #[test]
    fn expired_stories_are_hidden() {
        let (_tmp, pool) = setup();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO stories (user_id, media_url, created_at, expires_at)
             VALUES (2, '/old.jpg', datetime('now', '-2 days'), datetime('now', '-1 day'))",
            [],
        )
        .unwrap();
        let expired = conn.last_insert_rowid();

        assert!(list_story_groups(&conn, 1).unwrap().is_empty());
        assert!(matches!(record_view(&conn, expired, 1), Err(AppError::NotFound(_))));
    }

    #[test]
    fn views_are_recorded_once_and_not_for_owner() {
        let (_tmp, pool) = setup();
        let conn = pool.get().unwrap();
        let id = create_story(&conn, 2, "/s.jpg", MediaType::Image).unwrap();

        record_view(&conn, id, 1).unwrap();
        record_view(&conn, id, 1).unwrap();
        record_view(&conn, id, 2).unwrap();

        let viewers = list_viewers(&conn, id, 2).unwrap();
        assert_eq!(viewers.len(), 1);
        assert_eq!(viewers[0].user_id, 1);

        let groups = list_story_groups(&conn, 1).unwrap();
        assert!(groups[0].items[0].is_viewed);
        assert!(!groups[0].has_unviewed);
    }

    #[test]
    fn only_owner_lists_viewers() {
        let (_tmp, pool) = setup();
        let conn = pool.get().unwrap();
        let id = create_story(&conn, 2, "/s.jpg", MediaType::Video).unwrap();
        assert!(matches!(list_viewers(&conn, id, 1), Err(AppError::Forbidden(_))));
        assert!(matches!(list_viewers(&conn, 999, 2), Err(AppError::NotFound(_))));
    }

    #[test]
    fn is_mine_checks_owner() {
        let (_tmp, pool) = setup();
        let conn = pool.get().unwrap();
        let id = create_story(&conn, 1, "/s.jpg", MediaType::Image).unwrap();
        assert!(is_mine(&conn, id, 1).unwrap());
        assert!(!is_mine(&conn, id, 2).unwrap());
        assert!(matches!(is_mine(&conn, 999, 1), Err(AppError::NotFound(_))));
    }
}
