use rusqlite::{params, Connection, OptionalExtension};

use crate::db;
use crate::db::models::{PreferredMode, SignupMode, User, USER_COLUMNS};
use crate::error::{AppError, AppResult};

/// Fields for a new account row.
pub struct NewUser<'a> {
    pub signup_mode: SignupMode,
    pub username: &'a str,
    pub password_hash: Option<&'a str>,
    pub name: Option<&'a str>,
    pub phone: &'a str,
    pub profile_image: Option<&'a str>,
    pub preferred_mode: PreferredMode,
    pub kakao_user_id: Option<&'a str>,
}

pub fn hash_password(plain: &str, cost: u32) -> AppResult<String> {
    Ok(bcrypt::hash(plain, cost)?)
}

/// Accounts without a password (phone or Kakao sign-in) never match.
pub fn password_matches(plain: &str, hash: Option<&str>) -> bool {
    match hash {
        Some(hash) => bcrypt::verify(plain, hash).unwrap_or(false),
        None => false,
    }
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![id],
        User::from_row,
    )
    .optional()
}

pub fn find_active_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM users WHERE id = ?1 AND status = 'active'",
            USER_COLUMNS
        ),
        params![id],
        User::from_row,
    )
    .optional()
}

pub fn find_active_by_phone(conn: &Connection, phone: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM users WHERE phone = ?1 AND status = 'active'",
            USER_COLUMNS
        ),
        params![phone],
        User::from_row,
    )
    .optional()
}

pub fn find_active_by_kakao_id(conn: &Connection, kakao_id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM users WHERE kakao_user_id = ?1 AND status = 'active'",
            USER_COLUMNS
        ),
        params![kakao_id],
        User::from_row,
    )
    .optional()
}

pub fn phone_taken(conn: &Connection, phone: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE phone = ?1",
        params![phone],
        |r| r.get(0),
    )
}

pub fn username_taken(conn: &Connection, username: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username],
        |r| r.get(0),
    )
}

pub fn kakao_id_taken(conn: &Connection, kakao_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE kakao_user_id = ?1",
        params![kakao_id],
        |r| r.get(0),
    )
}

/// Reject a phone or username that is already registered.
pub fn ensure_unique(conn: &Connection, phone: &str, username: &str) -> AppResult<()> {
    if phone_taken(conn, phone)? {
        return Err(AppError::bad_request("Phone number is already registered"));
    }
    if username_taken(conn, username)? {
        return Err(AppError::bad_request("Username is already in use"));
    }
    Ok(())
}

/// Map a UNIQUE violation on `users` to the same 400 the pre-checks return.
pub fn duplicate_error(err: rusqlite::Error) -> AppError {
    match db::unique_violation(&err) {
        Some("users.phone") => AppError::bad_request("Phone number is already registered"),
        Some("users.username") => AppError::bad_request("Username is already in use"),
        Some("users.kakao_user_id") => {
            AppError::bad_request("This Kakao account is already registered")
        }
        _ => AppError::Database(err),
    }
}

pub fn insert_user(conn: &Connection, user: &NewUser<'_>) -> AppResult<User> {
    conn.execute(
        "INSERT INTO users (signup_mode, username, password, name, phone, profile_image,
                            preferred_mode, kakao_user_id, status, last_login_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', datetime('now'))",
        params![
            user.signup_mode.as_str(),
            user.username,
            user.password_hash,
            user.name,
            user.phone,
            user.profile_image,
            user.preferred_mode.as_str(),
            user.kakao_user_id,
        ],
    )
    .map_err(duplicate_error)?;
    let id = conn.last_insert_rowid();
    find_by_id(conn, id)?.ok_or_else(|| AppError::Internal("Inserted user vanished".into()))
}

/// Record a login, optionally switching the account into `mode`.
pub fn touch_login(conn: &Connection, user: &mut User, mode: Option<PreferredMode>) -> AppResult<()> {
    match mode {
        Some(mode) if user.preferred_mode != mode => {
            conn.execute(
                "UPDATE users SET preferred_mode = ?1, last_login_at = datetime('now'),
                                  updated_at = datetime('now')
                 WHERE id = ?2",
                params![mode.as_str(), user.id],
            )?;
            user.preferred_mode = mode;
        }
        _ => {
            conn.execute(
                "UPDATE users SET last_login_at = datetime('now') WHERE id = ?1",
                params![user.id],
            )?;
        }
    }
    Ok(())
}

pub fn set_password(conn: &Connection, user_id: i64, hash: &str) -> AppResult<()> {
    conn.execute(
        "UPDATE users SET password = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![hash, user_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn conn() -> (tempfile::TempDir, crate::state::DbPool) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("t.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (tmp, pool)
    }

    fn new_user<'a>(username: &'a str, phone: &'a str) -> NewUser<'a> {
        NewUser {
            signup_mode: SignupMode::Phone,
            username,
            password_hash: None,
            name: Some("Tester"),
            phone,
            profile_image: None,
            preferred_mode: PreferredMode::Normal,
            kakao_user_id: None,
        }
    }

    #[test]
    fn insert_and_find_by_phone() {
        let (_tmp, pool) = conn();
        let conn = pool.get().unwrap();
        let user = insert_user(&conn, &new_user("alice", "01011112222")).unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.status, "active");
        assert!(user.last_login_at.is_some());

        let found = find_active_by_phone(&conn, "01011112222").unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[test]
    fn ensure_unique_rejects_duplicates() {
        let (_tmp, pool) = conn();
        let conn = pool.get().unwrap();
        insert_user(&conn, &new_user("alice", "010")).unwrap();

        let err = ensure_unique(&conn, "010", "bob").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(m) if m.contains("Phone")));
        let err = ensure_unique(&conn, "011", "alice").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(m) if m.contains("Username")));
        assert!(ensure_unique(&conn, "011", "bob").is_ok());
    }

    #[test]
    fn racing_inserts_surface_as_bad_request() {
        let (_tmp, pool) = conn();
        let conn = pool.get().unwrap();
        insert_user(&conn, &new_user("alice", "010")).unwrap();

        let err = insert_user(&conn, &new_user("bob", "010")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(m) if m.contains("Phone")));
        let err = insert_user(&conn, &new_user("alice", "011")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(m) if m.contains("Username")));

        let mut kakao = new_user("carol", "012");
        kakao.kakao_user_id = Some("k-1");
        insert_user(&conn, &kakao).unwrap();
        let mut again = new_user("dave", "013");
        again.kakao_user_id = Some("k-1");
        let err = insert_user(&conn, &again).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(m) if m.contains("Kakao")));

        assert!(matches!(
            duplicate_error(rusqlite::Error::QueryReturnedNoRows),
            AppError::Database(_)
        ));
    }

    #[test]
    fn touch_login_switches_mode() {
        let (_tmp, pool) = conn();
        let conn = pool.get().unwrap();
        let mut user = insert_user(&conn, &new_user("alice", "010")).unwrap();
        touch_login(&conn, &mut user, Some(PreferredMode::Senior)).unwrap();
        assert_eq!(user.preferred_mode, PreferredMode::Senior);

        let stored = find_by_id(&conn, user.id).unwrap().unwrap();
        assert_eq!(stored.preferred_mode, PreferredMode::Senior);
    }

    #[test]
    fn passwordless_accounts_never_match() {
        assert!(!password_matches("anything", None));
        let hash = hash_password("secret", 4).unwrap();
        assert!(password_matches("secret", Some(&hash)));
        assert!(!password_matches("wrong", Some(&hash)));
    }
}
