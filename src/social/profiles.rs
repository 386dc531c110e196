use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::accounts;
use crate::db::models::{PreferredMode, User, UserSettings};
use crate::error::{AppError, AppResult};
use crate::social::follows;

pub const DEFAULT_SEARCH_LIMIT: i64 = 20;
pub const MAX_SEARCH_LIMIT: i64 = 50;

const FONT_SCALES: [&str; 3] = ["small", "medium", "large"];

/// Public profile header with aggregate counts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
    pub preferred_mode: PreferredMode,
    pub post_count: i64,
    pub follower_count: i64,
    pub following_count: i64,
    pub is_following: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResult {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub profile_image: Option<String>,
    pub is_following: bool,
}

/// Partial profile edit; `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct ProfileUpdate<'a> {
    pub name: Option<&'a str>,
    pub username: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub preferred_mode: Option<PreferredMode>,
}

#[derive(Debug, Default)]
pub struct SettingsUpdate {
    pub font_scale: Option<String>,
    pub notifications_on: Option<bool>,
    pub senior_simple_mode: Option<bool>,
    pub language: Option<String>,
    pub is_dark_mode: Option<bool>,
}

/// Profile of an active user as seen by `viewer`.
pub fn load_profile(conn: &Connection, viewer: i64, user_id: i64) -> AppResult<Profile> {
    let user = accounts::find_active_by_id(conn, user_id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let counts = follows::counts(conn, user_id)?;
    let post_count = crate::feed::query::count_author_posts(conn, user_id)?;
    let is_following = viewer != user_id && follows::is_following(conn, viewer, user_id)?;

    Ok(Profile {
        id: user.id,
        username: user.username,
        name: user.name,
        profile_image: user.profile_image,
        bio: user.bio,
        preferred_mode: user.preferred_mode,
        post_count,
        follower_count: counts.followers,
        following_count: counts.following,
        is_following,
    })
}

pub fn update_profile(conn: &Connection, user_id: i64, update: &ProfileUpdate<'_>) -> AppResult<User> {
    if let Some(username) = update.username {
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id != ?2)",
            params![username, user_id],
            |r| r.get(0),
        )?;
        if taken {
            return Err(AppError::bad_request("Username is already in use"));
        }
    }

    conn.execute(
        "UPDATE users SET
            name = COALESCE(?1, name),
            username = COALESCE(?2, username),
            bio = COALESCE(?3, bio),
            preferred_mode = COALESCE(?4, preferred_mode),
            updated_at = datetime('now')
         WHERE id = ?5",
        params![
            update.name,
            update.username,
            update.bio,
            update.preferred_mode.map(|m| m.as_str()),
            user_id,
        ],
    )
    .map_err(accounts::duplicate_error)?;
    accounts::find_by_id(conn, user_id)?.ok_or_else(|| AppError::not_found("User not found"))
}

pub fn set_profile_image(conn: &Connection, user_id: i64, url: &str) -> AppResult<()> {
    conn.execute(
        "UPDATE users SET profile_image = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![url, user_id],
    )?;
    Ok(())
}

/// `%` and `_` match literally inside a LIKE pattern.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Active users whose username or name contains `term`, excluding the viewer.
pub fn search_users(
    conn: &Connection,
    viewer: i64,
    term: &str,
    limit: i64,
) -> rusqlite::Result<Vec<SearchResult>> {
    let pattern = format!("%{}%", escape_like(term));
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.name, u.profile_image,
                EXISTS(SELECT 1 FROM user_follows f
                       WHERE f.follower_id = ?1 AND f.followee_id = u.id)
         FROM users u
         WHERE u.status = 'active'
           AND u.id != ?1
           AND (u.username LIKE ?2 ESCAPE '\\' OR u.name LIKE ?2 ESCAPE '\\')
         ORDER BY u.username ASC
         LIMIT ?3",
    )?;
    let results = stmt
        .query_map(params![viewer, pattern, limit], |row| {
            Ok(SearchResult {
                id: row.get(0)?,
                username: row.get(1)?,
                name: row.get(2)?,
                profile_image: row.get(3)?,
                is_following: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(results)
}

/// Stored settings, or the defaults when the user never saved any.
pub fn get_settings(conn: &Connection, user_id: i64) -> rusqlite::Result<UserSettings> {
    let stored = conn
        .query_row(
            "SELECT font_scale, notifications_on, senior_simple_mode, language, is_dark_mode
             FROM user_settings WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(UserSettings {
                    font_scale: row.get(0)?,
                    notifications_on: row.get(1)?,
                    senior_simple_mode: row.get(2)?,
                    language: row.get(3)?,
                    is_dark_mode: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(stored.unwrap_or_default())
}

/// Merge `update` into the stored settings and upsert the row.
pub fn update_settings(
    conn: &Connection,
    user_id: i64,
    update: SettingsUpdate,
) -> AppResult<UserSettings> {
    if let Some(scale) = &update.font_scale {
        if !FONT_SCALES.contains(&scale.as_str()) {
            return Err(AppError::bad_request(
                "fontScale must be one of small, medium, large",
            ));
        }
    }

    let mut settings = get_settings(conn, user_id)?;
    if let Some(scale) = update.font_scale {
        settings.font_scale = scale;
    }
    if let Some(on) = update.notifications_on {
        settings.notifications_on = on;
    }
    if let Some(simple) = update.senior_simple_mode {
        settings.senior_simple_mode = simple;
    }
    if let Some(language) = update.language {
        settings.language = language;
    }
    if let Some(dark) = update.is_dark_mode {
        settings.is_dark_mode = dark;
    }

    conn.execute(
        "INSERT INTO user_settings
            (user_id, font_scale, notifications_on, senior_simple_mode, language, is_dark_mode)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
            font_scale = excluded.font_scale,
            notifications_on = excluded.notifications_on,
            senior_simple_mode = excluded.senior_simple_mode,
            language = excluded.language,
            is_dark_mode = excluded.is_dark_mode,
            updated_at = datetime('now')",
        params![
            user_id,
            settings.font_scale,
            settings.notifications_on,
            settings.senior_simple_mode,
            settings.language,
            settings.is_dark_mode,
        ],
    )?;
    Ok(settings)
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

    fn user(conn: &Connection, username: &str, name: &str) -> i64 {
        conn.execute(
            "INSERT INTO users (signup_mode, username, name, phone) VALUES ('phone', ?1, ?2, ?1)",
            params![username, name],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_a\\"), "50\\%\\_a\\\\");
    }

    #[test]
    fn search_matches_name_or_username_and_skips_viewer() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let me = user(&conn, "kimchi", "Kim");
        let other = user(&conn, "kimbap", "Lee");
        let third = user(&conn, "park", "Kim Park");
        follows::follow(&conn, me, other).unwrap();

        let results = search_users(&conn, me, "kim", 20).unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![other, third]);
        assert!(results[0].is_following);
        assert!(!results[1].is_following);

        assert!(search_users(&conn, me, "%", 20).unwrap().is_empty());
    }

    #[test]
    fn settings_default_then_merge() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let id = user(&conn, "a", "A");

        assert_eq!(get_settings(&conn, id).unwrap().font_scale, "medium");

        let saved = update_settings(
            &conn,
            id,
            SettingsUpdate {
                font_scale: Some("large".into()),
                is_dark_mode: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(saved.font_scale, "large");
        assert!(saved.notifications_on);

        let again = update_settings(
            &conn,
            id,
            SettingsUpdate {
                language: Some("en".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(again.font_scale, "large");
        assert!(again.is_dark_mode);
        assert_eq!(again.language, "en");

        assert!(matches!(
            update_settings(
                &conn,
                id,
                SettingsUpdate {
                    font_scale: Some("huge".into()),
                    ..Default::default()
                },
            ),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn username_change_checks_other_accounts() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let a = user(&conn, "alice", "A");
        user(&conn, "bob", "B");

        let taken = update_profile(
            &conn,
            a,
            &ProfileUpdate {
                username: Some("bob"),
                ..Default::default()
            },
        );
        assert!(matches!(taken, Err(AppError::BadRequest(_))));

        let same = update_profile(
            &conn,
            a,
            &ProfileUpdate {
                username: Some("alice"),
                bio: Some("hello"),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(same.bio.as_deref(), Some("hello"));
        assert_eq!(same.name.as_deref(), Some("A"));
    }

    #[test]
    fn profile_counts_and_follow_state() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        let a = user(&conn, "a", "A");
        let b = user(&conn, "b", "B");
        follows::follow(&conn, a, b).unwrap();

        let profile = load_profile(&conn, a, b).unwrap();
        assert_eq!(profile.follower_count, 1);
        assert_eq!(profile.following_count, 0);
        assert!(profile.is_following);

        let own = load_profile(&conn, a, a).unwrap();
        assert!(!own.is_following);
        assert_eq!(own.following_count, 1);

        assert!(matches!(load_profile(&conn, a, 999), Err(AppError::NotFound(_))));
    }
}
