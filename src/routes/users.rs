use axum::extract::{Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use super::upload::{read_multipart, store_media};
use super::{optional, parse_id, MessageResponse};
use crate::db::models::{PreferredMode, User, UserSettings};
use crate::error::{AppError, AppResult, ErrorBody};
use crate::extractors::{ApiJson, ApiMultipart, ApiPath, CurrentUser};
use crate::feed::pagination::parse_number;
use crate::feed::{query, FeedItem, ProfilePagination};
use crate::social::follows::{self, FollowUser};
use crate::social::profiles::{
    self, Profile, ProfileUpdate, SearchResult, SettingsUpdate, DEFAULT_SEARCH_LIMIT,
    MAX_SEARCH_LIMIT,
};
use crate::state::AppState;

pub const USERS_TAG: &str = "users";

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProfileQuery {
    pub page: Option<String>,
    /// Posts per page (default 9, max 100)
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    pub q: Option<String>,
    /// Default 20, max 50
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct IsFollowingQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub success: bool,
    pub profile: Profile,
    pub posts: Vec<FeedItem>,
    pub pagination: ProfilePagination,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    /// `normal` or `senior`
    #[serde(alias = "preferredMode")]
    pub preferred_mode: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateProfileResponse {
    pub success: bool,
    pub message: String,
    pub user: User,
}

/// Multipart body of `POST /users/me/profile-image`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ProfileImageForm {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileImageResponse {
    pub success: bool,
    pub profile_image_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub success: bool,
    pub users: Vec<SearchResult>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub success: bool,
    pub settings: UserSettings,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    /// `small`, `medium` or `large`
    pub font_scale: Option<String>,
    pub notifications_on: Option<bool>,
    pub senior_simple_mode: Option<bool>,
    pub language: Option<String>,
    pub is_dark_mode: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FollowersResponse {
    pub success: bool,
    pub followers: Vec<FollowUser>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FollowingResponse {
    pub success: bool,
    pub following: Vec<FollowUser>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FolloweeRequest {
    /// Number or numeric string
    #[schema(value_type = i64)]
    pub followee_id: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IsFollowingResponse {
    pub success: bool,
    pub is_following: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(my_profile).put(update_me))
        .route("/me/profile-image", post(upload_profile_image))
        .route("/me/settings", get(get_settings).put(update_settings))
        .route("/me/followers", get(my_followers))
        .route("/me/followers/{id}", delete(remove_follower))
        .route("/me/following", get(my_following))
        .route("/me/following/{id}", delete(unfollow_by_path))
        .route("/search", get(search))
        .route("/follow", post(follow))
        .route("/unfollow", post(unfollow))
        .route("/isfollowing", get(is_following))
        .route("/{id}", get(user_profile))
}

fn profile_page(
    state: &AppState,
    viewer: i64,
    user_id: i64,
    params: &ProfileQuery,
) -> AppResult<ProfileResponse> {
    let conn = state.db.get()?;
    let profile = profiles::load_profile(&conn, viewer, user_id)?;
    let pagination = ProfilePagination::new(
        params.page.as_deref(),
        params.limit.as_deref(),
        profile.post_count,
    );
    let posts = query::list_author_posts(
        &conn,
        viewer,
        user_id,
        pagination.limit,
        pagination.offset,
    )?;
    Ok(ProfileResponse {
        success: true,
        profile,
        posts,
        pagination,
    })
}

/// The caller's own profile and posts.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = USERS_TAG,
    params(ProfileQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
)]
pub async fn my_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ProfileQuery>,
) -> AppResult<Json<ProfileResponse>> {
    Ok(Json(profile_page(&state, user.id, user.id, &params)?))
}

/// Another user's profile and posts.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = USERS_TAG,
    params(("id" = i64, Path, description = "User id"), ProfileQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
)]
pub async fn user_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    Query(params): Query<ProfileQuery>,
) -> AppResult<Json<ProfileResponse>> {
    Ok(Json(profile_page(&state, user.id, id, &params)?))
}

/// Edit name, username, bio or preferred mode.
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = USERS_TAG,
    request_body = UpdateProfileRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile updated", body = UpdateProfileResponse),
        (status = 400, description = "Username taken or invalid mode", body = ErrorBody),
    ),
)]
pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<UpdateProfileResponse>> {
    let preferred_mode = match optional(body.preferred_mode) {
        None => None,
        Some(mode) => Some(
            PreferredMode::parse(&mode)
                .ok_or_else(|| AppError::bad_request("preferred_mode must be normal or senior"))?,
        ),
    };
    let name = optional(body.name);
    let username = optional(body.username);
    let bio = body.bio.map(|b| b.trim().to_string());

    let conn = state.db.get()?;
    let updated = profiles::update_profile(
        &conn,
        user.id,
        &ProfileUpdate {
            name: name.as_deref(),
            username: username.as_deref(),
            bio: bio.as_deref(),
            preferred_mode,
        },
    )?;
    Ok(Json(UpdateProfileResponse {
        success: true,
        message: "Profile updated".to_string(),
        user: updated,
    }))
}

/// Replace the profile picture.
#[utoipa::path(
    post,
    path = "/api/v1/users/me/profile-image",
    tag = USERS_TAG,
    request_body(content = ProfileImageForm, content_type = "multipart/form-data"),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Image stored", body = ProfileImageResponse),
        (status = 400, description = "Missing or non-image file", body = ErrorBody),
    ),
)]
pub async fn upload_profile_image(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiMultipart(multipart): ApiMultipart,
) -> AppResult<Json<ProfileImageResponse>> {
    let mut form = read_multipart(multipart).await?;
    let image = form
        .take_file("image")
        .ok_or_else(|| AppError::bad_request("image file is required"))?;
    if !image.content_type.starts_with("image/") {
        return Err(AppError::bad_request("Profile picture must be an image"));
    }

    let processed = state.processor.image(image.into_media()).await;
    let url = store_media(&state, "profiles", processed).await?;

    let conn = state.db.get()?;
    profiles::set_profile_image(&conn, user.id, &url)?;
    Ok(Json(ProfileImageResponse {
        success: true,
        profile_image_url: url,
    }))
}

/// Find users by username or name.
#[utoipa::path(
    get,
    path = "/api/v1/users/search",
    tag = USERS_TAG,
    params(SearchQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Matching users", body = SearchResponse),
        (status = 400, description = "Blank query", body = ErrorBody),
    ),
)]
pub async fn search(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<SearchResponse>> {
    let term = optional(params.q).ok_or_else(|| AppError::bad_request("Search query is required"))?;
    let limit = parse_number(params.limit.as_deref())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .min(MAX_SEARCH_LIMIT);

    let conn = state.db.get()?;
    Ok(Json(SearchResponse {
        success: true,
        users: profiles::search_users(&conn, user.id, &term, limit)?,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me/settings",
    tag = USERS_TAG,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Settings (defaults if never saved)", body = SettingsResponse),
    ),
)]
pub async fn get_settings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<SettingsResponse>> {
    let conn = state.db.get()?;
    Ok(Json(SettingsResponse {
        success: true,
        settings: profiles::get_settings(&conn, user.id)?,
    }))
}

/// Partial settings update.
#[utoipa::path(
    put,
    path = "/api/v1/users/me/settings",
    tag = USERS_TAG,
    request_body = UpdateSettingsRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Saved settings", body = SettingsResponse),
        (status = 400, description = "Invalid fontScale", body = ErrorBody),
    ),
)]
pub async fn update_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<UpdateSettingsRequest>,
) -> AppResult<Json<SettingsResponse>> {
    let conn = state.db.get()?;
    let settings = profiles::update_settings(
        &conn,
        user.id,
        SettingsUpdate {
            font_scale: body.font_scale,
            notifications_on: body.notifications_on,
            senior_simple_mode: body.senior_simple_mode,
            language: optional(body.language),
            is_dark_mode: body.is_dark_mode,
        },
    )?;
    Ok(Json(SettingsResponse {
        success: true,
        settings,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me/followers",
    tag = USERS_TAG,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Followers, newest first", body = FollowersResponse),
    ),
)]
pub async fn my_followers(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<FollowersResponse>> {
    let conn = state.db.get()?;
    Ok(Json(FollowersResponse {
        success: true,
        followers: follows::list_followers(&conn, user.id)?,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me/following",
    tag = USERS_TAG,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Followed accounts, newest first", body = FollowingResponse),
    ),
)]
pub async fn my_following(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<FollowingResponse>> {
    let conn = state.db.get()?;
    Ok(Json(FollowingResponse {
        success: true,
        following: follows::list_following(&conn, user.id)?,
    }))
}

/// Remove someone from the caller's followers.
#[utoipa::path(
    delete,
    path = "/api/v1/users/me/followers/{id}",
    tag = USERS_TAG,
    params(("id" = i64, Path, description = "Follower's user id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Follower removed", body = MessageResponse),
        (status = 404, description = "Not a follower", body = ErrorBody),
    ),
)]
pub async fn remove_follower(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<MessageResponse>> {
    let conn = state.db.get()?;
    follows::remove_follower(&conn, user.id, id)?;
    Ok(Json(MessageResponse::ok("Follower removed")))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/me/following/{id}",
    tag = USERS_TAG,
    params(("id" = i64, Path, description = "Followed user's id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unfollowed", body = MessageResponse),
        (status = 404, description = "Not following", body = ErrorBody),
    ),
)]
pub async fn unfollow_by_path(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<MessageResponse>> {
    let conn = state.db.get()?;
    follows::unfollow(&conn, user.id, id)?;
    Ok(Json(MessageResponse::ok("Unfollowed")))
}

fn followee_id(body: &FolloweeRequest) -> AppResult<i64> {
    parse_id(body.followee_id.as_ref()).ok_or_else(|| AppError::bad_request("Invalid followeeId"))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/follow",
    tag = USERS_TAG,
    request_body = FolloweeRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Now following", body = MessageResponse),
        (status = 400, description = "Self-follow or already following", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
)]
pub async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<FolloweeRequest>,
) -> AppResult<Json<MessageResponse>> {
    let followee = followee_id(&body)?;
    let conn = state.db.get()?;
    follows::follow(&conn, user.id, followee)?;
    tracing::debug!("User {} followed {}", user.id, followee);
    Ok(Json(MessageResponse::ok("Followed")))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/unfollow",
    tag = USERS_TAG,
    request_body = FolloweeRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unfollowed", body = MessageResponse),
        (status = 404, description = "Not following", body = ErrorBody),
    ),
)]
pub async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<FolloweeRequest>,
) -> AppResult<Json<MessageResponse>> {
    let followee = followee_id(&body)?;
    let conn = state.db.get()?;
    follows::unfollow(&conn, user.id, followee)?;
    Ok(Json(MessageResponse::ok("Unfollowed")))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/isfollowing",
    tag = USERS_TAG,
    params(IsFollowingQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Follow state", body = IsFollowingResponse),
        (status = 400, description = "Missing or invalid userId", body = ErrorBody),
    ),
)]
pub async fn is_following(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<IsFollowingQuery>,
) -> AppResult<Json<IsFollowingResponse>> {
    let target = parse_number(params.user_id.as_deref())
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::bad_request("Invalid userId"))?;
    let conn = state.db.get()?;
    Ok(Json(IsFollowingResponse {
        success: true,
        is_following: follows::is_following(&conn, user.id, target)?,
    }))
}
