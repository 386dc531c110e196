use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::auth::{self, KakaoLoginRequest, KakaoSignupRequest, SignupResponse};
use super::{optional, required};
use crate::auth::accounts::{self, NewUser};
use crate::auth::{normalize_phone, token, CodeCheck};
use crate::db::models::{PreferredMode, SignupMode, User};
use crate::error::{AppError, AppResult, ErrorBody};
use crate::extractors::{ApiJson, ApiPath, CurrentUser, MaybeUser};
use crate::feed::{query, FeedItem, PageRequest};
use crate::social::comments;
use crate::state::AppState;

pub const SENIOR_TAG: &str = "senior";

#[derive(Debug, Deserialize, ToSchema)]
pub struct PhoneAuthRequest {
    pub phone: Option<String>,
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PhoneAuthData {
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhoneAuthResponse {
    pub success: bool,
    pub message: String,
    pub data: PhoneAuthData,
    pub token: String,
    pub is_new_user: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeniorHomeData {
    pub recent_posts: Vec<FeedItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SeniorHomeResponse {
    pub success: bool,
    pub data: SeniorHomeData,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SeniorCommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeniorCommentCreated {
    pub success: bool,
    pub message: String,
    pub comment_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeniorComment {
    pub comment_id: i64,
    pub content: String,
    pub created_at: String,
    pub author_id: i64,
    pub author_name: String,
    pub author_profile_image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SeniorCommentList {
    pub success: bool,
    pub message: String,
    pub data: Vec<SeniorComment>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/send-code", post(auth::send_code))
        .route("/auth/verify-code", post(auth::verify_code))
        .route("/auth/phone", post(phone_auth))
        .route("/auth/kakao/login", post(kakao_login))
        .route("/auth/kakao/signup", post(kakao_signup))
        .route("/home", get(home))
        .route("/comment/{post_id}", post(create_comment).get(list_comments))
        .route(
            "/postlike/{post_id}",
            post(super::posts::like_post)
                .delete(super::posts::unlike_post)
                .get(super::posts::is_liked),
        )
}

/// Sign in, or sign up on first use, with a phone number and SMS code.
#[utoipa::path(
    post,
    path = "/api/v1/senior/auth/phone",
    tag = SENIOR_TAG,
    request_body = PhoneAuthRequest,
    responses(
        (status = 200, description = "Logged in (account created if new)", body = PhoneAuthResponse),
        (status = 400, description = "Missing phone/code or invalid code", body = ErrorBody),
    ),
)]
pub async fn phone_auth(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PhoneAuthRequest>,
) -> AppResult<Json<PhoneAuthResponse>> {
    let phone = normalize_phone(&required(body.phone, "phone")?);
    let code = required(body.code, "code")?;

    let check = state.codes.lock().await.consume(&phone, &code);
    if check != CodeCheck::Ok {
        return Err(AppError::bad_request(check.message()));
    }

    let conn = state.db.get()?;
    let (user, is_new_user) = match accounts::find_active_by_phone(&conn, &phone)? {
        Some(mut user) => {
            accounts::touch_login(&conn, &mut user, Some(PreferredMode::Senior))?;
            (user, false)
        }
        None => {
            let name = optional(body.name).unwrap_or_else(|| default_senior_name(&phone));
            let username = format!("senior_{}", phone);
            accounts::ensure_unique(&conn, &phone, &username)?;
            let user = accounts::insert_user(
                &conn,
                &NewUser {
                    signup_mode: SignupMode::Phone,
                    username: &username,
                    password_hash: None,
                    name: Some(&name),
                    phone: &phone,
                    profile_image: None,
                    preferred_mode: PreferredMode::Senior,
                    kakao_user_id: None,
                },
            )?;
            tracing::info!("Senior account created: {}", user.id);
            (user, true)
        }
    };

    let token = token::issue_token(&state.config.auth, user.id)?;
    Ok(Json(PhoneAuthResponse {
        success: true,
        message: if is_new_user {
            "Signup and login successful".to_string()
        } else {
            "Login successful".to_string()
        },
        data: PhoneAuthData { user },
        token,
        is_new_user,
    }))
}

/// `시니어` followed by the last four digits of the phone number.
pub fn default_senior_name(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().collect();
    let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
    format!("시니어{}", tail)
}

/// Kakao login that switches the account to senior mode.
#[utoipa::path(
    post,
    path = "/api/v1/senior/auth/kakao/login",
    tag = SENIOR_TAG,
    request_body = KakaoLoginRequest,
    responses(
        (status = 200, description = "Logged in", body = auth::LoginResponse),
        (status = 401, description = "Kakao rejected the access token", body = ErrorBody),
        (status = 404, description = "No linked account; sign up first", body = auth::KakaoSignupNeeded),
    ),
)]
pub async fn kakao_login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<KakaoLoginRequest>,
) -> AppResult<Response> {
    auth::kakao_login_as(&state, body, Some(PreferredMode::Senior)).await
}

/// Kakao signup in senior mode.
#[utoipa::path(
    post,
    path = "/api/v1/senior/auth/kakao/signup",
    tag = SENIOR_TAG,
    request_body = KakaoSignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupResponse),
        (status = 400, description = "Missing field or already registered", body = ErrorBody),
        (status = 401, description = "Kakao rejected the access token", body = ErrorBody),
    ),
)]
pub async fn kakao_signup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<KakaoSignupRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    auth::kakao_signup_as(&state, body, PreferredMode::Senior).await
}

/// Recent senior-mode posts from everyone.
#[utoipa::path(
    get,
    path = "/api/v1/senior/home",
    tag = SENIOR_TAG,
    responses(
        (status = 200, description = "Senior home", body = SeniorHomeResponse),
    ),
)]
pub async fn home(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> AppResult<Json<SeniorHomeResponse>> {
    let conn = state.db.get()?;
    let page = query::list_senior_home(&conn, user.map(|u| u.id), PageRequest::default())?;
    Ok(Json(SeniorHomeResponse {
        success: true,
        data: SeniorHomeData {
            recent_posts: page.items,
        },
    }))
}

/// Comment on a post.
#[utoipa::path(
    post,
    path = "/api/v1/senior/comment/{post_id}",
    tag = SENIOR_TAG,
    params(("post_id" = i64, Path, description = "Post id")),
    request_body = SeniorCommentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Comment created", body = SeniorCommentCreated),
        (status = 400, description = "Blank or too long", body = ErrorBody),
        (status = 404, description = "Post not found", body = ErrorBody),
    ),
)]
pub async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(post_id): ApiPath<i64>,
    ApiJson(body): ApiJson<SeniorCommentRequest>,
) -> AppResult<(StatusCode, Json<SeniorCommentCreated>)> {
    let mut conn = state.db.get()?;
    let row = comments::create_comment(
        &mut conn,
        post_id,
        user.id,
        body.content.as_deref().unwrap_or_default(),
    )?;
    Ok((
        StatusCode::CREATED,
        Json(SeniorCommentCreated {
            success: true,
            message: "Comment added".to_string(),
            comment_id: row.id,
        }),
    ))
}

/// Comments on a post, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/senior/comment/{post_id}",
    tag = SENIOR_TAG,
    params(("post_id" = i64, Path, description = "Post id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Comments", body = SeniorCommentList),
    ),
)]
pub async fn list_comments(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(post_id): ApiPath<i64>,
) -> AppResult<Json<SeniorCommentList>> {
    let conn = state.db.get()?;
    let data = comments::list_comments(&conn, post_id)?
        .into_iter()
        .map(|c| SeniorComment {
            comment_id: c.id,
            content: c.content,
            created_at: c.created_at,
            author_id: c.author_id,
            author_name: c.author_name.unwrap_or(c.author_username),
            author_profile_image: c.author_profile_image,
        })
        .collect();
    Ok(Json(SeniorCommentList {
        success: true,
        message: "Comments loaded".to_string(),
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_uses_last_four_digits() {
        assert_eq!(default_senior_name("01012345678"), "시니어5678");
        assert_eq!(default_senior_name("12"), "시니어12");
    }
}
