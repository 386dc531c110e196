use rusqlite::Row;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PreferredMode {
    Normal,
    Senior,
}

impl PreferredMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferredMode::Normal => "normal",
            PreferredMode::Senior => "senior",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(PreferredMode::Normal),
            "senior" => Some(PreferredMode::Senior),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SignupMode {
    Phone,
    Kakao,
}

impl SignupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignupMode::Phone => "phone",
            SignupMode::Kakao => "kakao",
        }
    }
}

pub const USER_COLUMNS: &str = "id, signup_mode, username, password, name, phone, profile_image, \
     bio, preferred_mode, kakao_user_id, status, last_login_at, created_at, updated_at";

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub signup_mode: String,
    pub username: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub phone: String,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
    pub preferred_mode: PreferredMode,
    #[serde(skip)]
    pub kakao_user_id: Option<String>,
    pub status: String,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Map a row selected with [`USER_COLUMNS`].
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let mode: String = row.get(8)?;
        Ok(User {
            id: row.get(0)?,
            signup_mode: row.get(1)?,
            username: row.get(2)?,
            password_hash: row.get(3)?,
            name: row.get(4)?,
            phone: row.get(5)?,
            profile_image: row.get(6)?,
            bio: row.get(7)?,
            preferred_mode: PreferredMode::parse(&mode).unwrap_or(PreferredMode::Normal),
            kakao_user_id: row.get(9)?,
            status: row.get(10)?,
            last_login_at: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

/// Compact author block embedded in posts, comments and stories.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub font_scale: String,
    pub notifications_on: bool,
    pub senior_simple_mode: bool,
    pub language: String,
    pub is_dark_mode: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            font_scale: "medium".to_string(),
            notifications_on: true,
            senior_simple_mode: false,
            language: "ko".to_string(),
            is_dark_mode: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Feed,
    Reel,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Feed => "feed",
            PostType::Reel => "reel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "feed" => Some(PostType::Feed),
            "reel" => Some(PostType::Reel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.starts_with("image/") {
            Some(MediaType::Image)
        } else if content_type.starts_with("video/") {
            Some(MediaType::Video)
        } else {
            None
        }
    }
}
