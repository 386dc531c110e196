use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;
use utoipa::ToSchema;

use super::pagination::{Page, PageRequest};
use super::relative_time::parse_and_format_time;
use crate::db::models::{Author, PostType};
use crate::db::placeholders;

pub const COMMENT_PREVIEW_LIMIT: i64 = 3;

/// Which `is_senior_mode` posts a feed shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedMode {
    #[default]
    All,
    Senior,
    Normal,
}

impl FeedMode {
    /// Unknown values read as `All`.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("senior") => FeedMode::Senior,
            Some("normal") => FeedMode::Normal,
            _ => FeedMode::All,
        }
    }

    fn senior_flag(&self) -> Option<bool> {
        match self {
            FeedMode::All => None,
            FeedMode::Senior => Some(true),
            FeedMode::Normal => Some(false),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: i64,
    pub author: Author,
    pub content: Option<String>,
    pub image_urls: Vec<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub post_type: PostType,
    pub is_senior_mode: bool,
    pub like_count: i64,
    pub comment_count: i64,
    pub is_liked: bool,
    pub created_at: String,
    /// Relative time, e.g. `5분 전`.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments_preview: Option<Vec<CommentPreview>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentPreview {
    pub id: i64,
    pub content: String,
    pub author: Author,
    pub created_at: String,
    pub timestamp: String,
}

/// Conditions applied on top of "not deleted". `None` means unrestricted.
#[derive(Debug, Default)]
struct PostFilter {
    post_type: Option<PostType>,
    senior: Option<bool>,
    /// Only the viewer's own posts and posts of accounts they follow.
    visible_to: Option<i64>,
    author: Option<i64>,
    post_id: Option<i64>,
}

const POST_SELECT: &str = "
    SELECT p.id, p.author_id, u.username, u.name, u.profile_image,
           p.content, p.post_type, p.video_url, p.thumbnail_url, p.is_senior_mode,
           p.like_count, p.comment_count, p.created_at,
           EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1) AS is_liked
    FROM posts p
    JOIN users u ON u.id = p.author_id
    WHERE p.deleted_at IS NULL
      AND (?2 IS NULL OR p.post_type = ?2)
      AND (?3 IS NULL OR p.is_senior_mode = ?3)
      AND (?4 IS NULL OR p.author_id IN (
            SELECT ?4 UNION SELECT followee_id FROM user_follows WHERE follower_id = ?4))
      AND (?5 IS NULL OR p.author_id = ?5)
      AND (?6 IS NULL OR p.id = ?6)
    ORDER BY p.created_at DESC, p.id DESC
    LIMIT ?7 OFFSET ?8";

fn map_post(row: &Row<'_>) -> rusqlite::Result<FeedItem> {
    let post_type: String = row.get(6)?;
    let created_at: String = row.get(12)?;
    Ok(FeedItem {
        id: row.get(0)?,
        author: Author {
            id: row.get(1)?,
            username: row.get(2)?,
            name: row.get(3)?,
            profile_image_url: row.get(4)?,
        },
        content: row.get(5)?,
        image_urls: Vec::new(),
        video_url: row.get(7)?,
        thumbnail_url: row.get(8)?,
        post_type: PostType::parse(&post_type).unwrap_or(PostType::Feed),
        is_senior_mode: row.get(9)?,
        like_count: row.get(10)?,
        comment_count: row.get(11)?,
        is_liked: row.get(13)?,
        timestamp: parse_and_format_time(&created_at),
        created_at,
        comments_preview: None,
    })
}

fn query_posts(
    conn: &Connection,
    viewer: Option<i64>,
    filter: &PostFilter,
    limit: i64,
    offset: i64,
) -> rusqlite::Result<Vec<FeedItem>> {
    let mut stmt = conn.prepare_cached(POST_SELECT)?;
    let mut items = stmt
        .query_map(
            params![
                viewer.unwrap_or(0),
                filter.post_type.map(|t| t.as_str()),
                filter.senior,
                filter.visible_to,
                filter.author,
                filter.post_id,
                limit,
                offset,
            ],
            map_post,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    attach_images(conn, &mut items)?;
    Ok(items)
}

fn query_page(
    conn: &Connection,
    viewer: Option<i64>,
    filter: &PostFilter,
    page: PageRequest,
) -> rusqlite::Result<Page<FeedItem>> {
    let rows = query_posts(conn, viewer, filter, page.fetch_limit(), page.offset())?;
    Ok(Page::from_rows(rows, page))
}

/// Fill `image_urls` for every item with a single `IN (...)` query.
fn attach_images(conn: &Connection, items: &mut [FeedItem]) -> rusqlite::Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = items.iter().map(|p| p.id).collect();
    let sql = format!(
        "SELECT post_id, image_url FROM post_images
         WHERE post_id IN ({})
         ORDER BY post_id, position, id",
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut by_post: HashMap<i64, Vec<String>> = HashMap::new();
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (post_id, url) = row?;
        by_post.entry(post_id).or_default().push(url);
    }
    for item in items.iter_mut() {
        if let Some(urls) = by_post.remove(&item.id) {
            item.image_urls = urls;
        }
    }
    Ok(())
}

/// Attach the newest comments of each post, at most [`COMMENT_PREVIEW_LIMIT`] per post.
fn attach_comment_previews(conn: &Connection, items: &mut [FeedItem]) -> rusqlite::Result<()> {
    for item in items.iter_mut() {
        item.comments_preview = Some(Vec::new());
    }
    if items.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = items.iter().map(|p| p.id).collect();
    let sql = format!(
        "SELECT id, post_id, author_id, username, name, profile_image, content, created_at
         FROM (
             SELECT c.id, c.post_id, c.author_id, u.username, u.name, u.profile_image,
                    c.content, c.created_at,
                    ROW_NUMBER() OVER (
                        PARTITION BY c.post_id ORDER BY c.created_at DESC, c.id DESC
                    ) AS rn
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.deleted_at IS NULL AND c.post_id IN ({})
         )
         WHERE rn <= {}
         ORDER BY post_id, created_at DESC, id DESC",
        placeholders(ids.len()),
        COMMENT_PREVIEW_LIMIT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        let created_at: String = row.get(7)?;
        Ok((
            row.get::<_, i64>(1)?,
            CommentPreview {
                id: row.get(0)?,
                author: Author {
                    id: row.get(2)?,
                    username: row.get(3)?,
                    name: row.get(4)?,
                    profile_image_url: row.get(5)?,
                },
                content: row.get(6)?,
                timestamp: parse_and_format_time(&created_at),
                created_at,
            },
        ))
    })?;

    let mut by_post: HashMap<i64, Vec<CommentPreview>> = HashMap::new();
    for row in rows {
        let (post_id, preview) = row?;
        by_post.entry(post_id).or_default().push(preview);
    }
    for item in items.iter_mut() {
        if let Some(previews) = by_post.remove(&item.id) {
            item.comments_preview = Some(previews);
        }
    }
    Ok(())
}

/// Feed posts by the viewer and the accounts they follow.
pub fn list_feed(
    conn: &Connection,
    viewer: i64,
    mode: FeedMode,
    page: PageRequest,
) -> rusqlite::Result<Page<FeedItem>> {
    let filter = PostFilter {
        post_type: Some(PostType::Feed),
        senior: mode.senior_flag(),
        visible_to: Some(viewer),
        ..Default::default()
    };
    query_page(conn, Some(viewer), &filter, page)
}

/// All reels, newest first.
pub fn list_reels(
    conn: &Connection,
    viewer: i64,
    page: PageRequest,
) -> rusqlite::Result<Page<FeedItem>> {
    let filter = PostFilter {
        post_type: Some(PostType::Reel),
        ..Default::default()
    };
    query_page(conn, Some(viewer), &filter, page)
}

/// Senior-mode feed posts from followed accounts, each with a comment preview.
pub fn list_senior_feed(
    conn: &Connection,
    viewer: i64,
    page: PageRequest,
) -> rusqlite::Result<Page<FeedItem>> {
    let filter = PostFilter {
        post_type: Some(PostType::Feed),
        senior: Some(true),
        visible_to: Some(viewer),
        ..Default::default()
    };
    let mut page = query_page(conn, Some(viewer), &filter, page)?;
    attach_comment_previews(conn, &mut page.items)?;
    Ok(page)
}

/// Recent senior-mode feed posts from everyone, for the public senior home.
pub fn list_senior_home(
    conn: &Connection,
    viewer: Option<i64>,
    page: PageRequest,
) -> rusqlite::Result<Page<FeedItem>> {
    let filter = PostFilter {
        post_type: Some(PostType::Feed),
        senior: Some(true),
        ..Default::default()
    };
    query_page(conn, viewer, &filter, page)
}

pub fn get_post(conn: &Connection, viewer: i64, post_id: i64) -> rusqlite::Result<Option<FeedItem>> {
    let filter = PostFilter {
        post_id: Some(post_id),
        ..Default::default()
    };
    Ok(query_posts(conn, Some(viewer), &filter, 1, 0)?.into_iter().next())
}

pub fn count_author_posts(conn: &Connection, author_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE author_id = ?1 AND deleted_at IS NULL",
        params![author_id],
        |r| r.get(0),
    )
}

/// Profile grid: every live post of one author.
pub fn list_author_posts(
    conn: &Connection,
    viewer: i64,
    author_id: i64,
    limit: i64,
    offset: i64,
) -> rusqlite::Result<Vec<FeedItem>> {
    let filter = PostFilter {
        author: Some(author_id),
        ..Default::default()
    };
    query_posts(conn, Some(viewer), &filter, limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::state::DbPool;

    fn pool() -> (tempfile::TempDir, DbPool) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("t.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (tmp, pool)
    }

    fn user(conn: &Connection, name: &str) -> i64 {
        conn.execute(
            "INSERT INTO users (signup_mode, username, name, phone) VALUES ('phone', ?1, ?1, ?1)",
            params![name],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn post(conn: &Connection, author: i64, post_type: &str, senior: bool, created_at: &str) -> i64 {
        conn.execute(
            "INSERT INTO posts (author_id, content, post_type, is_senior_mode, created_at)
             VALUES (?1, 'hello', ?2, ?3, ?4)",
            params![author, post_type, senior, created_at],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn follow(conn: &Connection, follower: i64, followee: i64) {
        conn.execute(
            "INSERT INTO user_follows (follower_id, followee_id) VALUES (?1, ?2)",
            params![follower, followee],
        )
        .unwrap();
    }

    #[test]
    fn feed_shows_own_and_followed_posts_only() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let me = user(&conn, "me");
        let friend = user(&conn, "friend");
        let stranger = user(&conn, "stranger");
        follow(&conn, me, friend);

        let mine = post(&conn, me, "feed", false, "2025-01-01 00:00:01");
        let theirs = post(&conn, friend, "feed", false, "2025-01-01 00:00:02");
        post(&conn, stranger, "feed", false, "2025-01-01 00:00:03");
        post(&conn, friend, "reel", false, "2025-01-01 00:00:04");

        let page = list_feed(&conn, me, FeedMode::All, PageRequest::default()).unwrap();
        let ids: Vec<i64> = page.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![theirs, mine]);
        assert!(!page.has_next);
    }

    #[test]
    fn feed_mode_filters_senior_flag() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let me = user(&conn, "me");
        let senior = post(&conn, me, "feed", true, "2025-01-01 00:00:01");
        let normal = post(&conn, me, "feed", false, "2025-01-01 00:00:02");

        let page = list_feed(&conn, me, FeedMode::Senior, PageRequest::default()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, senior);

        let page = list_feed(&conn, me, FeedMode::Normal, PageRequest::default()).unwrap();
        assert_eq!(page.items[0].id, normal);
    }

    #[test]
    fn has_next_uses_extra_row() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let me = user(&conn, "me");
        for i in 0..5 {
            post(&conn, me, "feed", false, &format!("2025-01-01 00:00:0{}", i));
        }

        let first = list_feed(&conn, me, FeedMode::All, PageRequest::new(1, 2)).unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_next);

        let last = list_feed(&conn, me, FeedMode::All, PageRequest::new(3, 2)).unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_next);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let me = user(&conn, "me");
        post(&conn, me, "feed", false, "2025-01-01 00:00:00");

        let page = list_feed(
            &conn,
            me,
            FeedMode::All,
            PageRequest::parse(Some("9223372036854775807"), Some("10")),
        )
        .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn deleted_posts_are_hidden() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let me = user(&conn, "me");
        let id = post(&conn, me, "feed", false, "2025-01-01 00:00:00");
        conn.execute(
            "UPDATE posts SET deleted_at = datetime('now') WHERE id = ?1",
            params![id],
        )
        .unwrap();

        assert!(get_post(&conn, me, id).unwrap().is_none());
        assert_eq!(count_author_posts(&conn, me).unwrap(), 0);
    }

    #[test]
    fn images_are_attached_in_position_order() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let me = user(&conn, "me");
        let id = post(&conn, me, "feed", false, "2025-01-01 00:00:00");
        conn.execute(
            "INSERT INTO post_images (post_id, image_url, position) VALUES (?1, 'b', 1), (?1, 'a', 0)",
            params![id],
        )
        .unwrap();

        let item = get_post(&conn, me, id).unwrap().unwrap();
        assert_eq!(item.image_urls, vec!["a", "b"]);
    }

    #[test]
    fn is_liked_reflects_viewer() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let me = user(&conn, "me");
        let other = user(&conn, "other");
        let id = post(&conn, me, "feed", false, "2025-01-01 00:00:00");
        conn.execute(
            "INSERT INTO likes (post_id, user_id) VALUES (?1, ?2)",
            params![id, other],
        )
        .unwrap();

        assert!(!get_post(&conn, me, id).unwrap().unwrap().is_liked);
        assert!(get_post(&conn, other, id).unwrap().unwrap().is_liked);
    }

    #[test]
    fn reels_are_not_follow_restricted() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let me = user(&conn, "me");
        let stranger = user(&conn, "stranger");
        let reel = post(&conn, stranger, "reel", false, "2025-01-01 00:00:00");
        post(&conn, stranger, "feed", false, "2025-01-01 00:00:01");

        let page = list_reels(&conn, me, PageRequest::default()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, reel);
    }

    #[test]
    fn senior_feed_carries_three_newest_comments() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let me = user(&conn, "me");
        let id = post(&conn, me, "feed", true, "2025-01-01 00:00:00");
        post(&conn, me, "feed", false, "2025-01-01 00:00:01");
        for i in 1..=4 {
            conn.execute(
                "INSERT INTO comments (post_id, author_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, me, format!("c{}", i), format!("2025-01-02 00:00:0{}", i)],
            )
            .unwrap();
        }

        let page = list_senior_feed(&conn, me, PageRequest::default()).unwrap();
        assert_eq!(page.items.len(), 1);
        let previews = page.items[0].comments_preview.as_ref().unwrap();
        let contents: Vec<&str> = previews.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["c4", "c3", "c2"]);
    }

    #[test]
    fn senior_home_spans_all_authors() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let a = user(&conn, "a");
        let b = user(&conn, "b");
        post(&conn, a, "feed", true, "2025-01-01 00:00:00");
        post(&conn, b, "feed", true, "2025-01-01 00:00:01");
        post(&conn, b, "feed", false, "2025-01-01 00:00:02");

        let page = list_senior_home(&conn, None, PageRequest::default()).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|p| !p.is_liked));
    }

    #[test]
    fn feed_mode_parse_is_lenient() {
        assert_eq!(FeedMode::parse(Some("senior")), FeedMode::Senior);
        assert_eq!(FeedMode::parse(Some("normal")), FeedMode::Normal);
        assert_eq!(FeedMode::parse(Some("whatever")), FeedMode::All);
        assert_eq!(FeedMode::parse(None), FeedMode::All);
    }

    #[test]
    fn author_posts_are_paged() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let me = user(&conn, "me");
        for i in 0..3 {
            post(&conn, me, "feed", false, &format!("2025-01-01 00:00:0{}", i));
        }
        assert_eq!(count_author_posts(&conn, me).unwrap(), 3);
        assert_eq!(list_author_posts(&conn, me, me, 2, 2).unwrap().len(), 1);
    }
}
