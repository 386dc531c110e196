use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{optional, required, MessageResponse};
use crate::auth::accounts::{self, NewUser};
use crate::auth::verification::mask_phone;
use crate::auth::{normalize_phone, token, CodeCheck};
use crate::db::models::{PreferredMode, SignupMode, User};
use crate::error::{AppError, AppResult, ErrorBody};
use crate::extractors::{ApiJson, CurrentUser, MaybeUser};
use crate::services::kakao::KakaoUser;
use crate::state::AppState;

pub const AUTH_TAG: &str = "auth";

pub const MIN_PASSWORD_CHARS: usize = 4;

// --- Requests ---

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub signup_mode: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub profile_image: Option<String>,
    pub preferred_mode: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct KakaoLoginRequest {
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct KakaoSignupRequest {
    pub access_token: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendCodeRequest {
    pub phone: Option<String>,
    /// `signup`, `find_pw` or `senior`
    #[serde(rename = "type")]
    pub purpose: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyCodeRequest {
    pub phone: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub phone: Option<String>,
    pub code: Option<String>,
}

// --- Responses ---

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthData {
    pub user: User,
    /// Bearer access token
    pub tokens: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
    pub data: AuthData,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginUser {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginData {
    pub user: LoginUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub data: LoginData,
    pub token: String,
}

impl LoginResponse {
    fn new(user: &User, token: String) -> Self {
        LoginResponse {
            success: true,
            message: "Login successful".to_string(),
            data: LoginData {
                user: LoginUser {
                    id: user.id,
                    username: user.username.clone(),
                    name: user.name.clone(),
                },
            },
            token,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KakaoSignupNeeded {
    pub success: bool,
    pub message: String,
    pub needs_signup: bool,
    pub kakao_user: KakaoUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeData {
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub success: bool,
    pub data: MeData,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/kakao/login", post(kakao_login))
        .route("/kakao/signup", post(kakao_signup))
        .route("/me", get(me))
        .route("/send-code", post(send_code))
        .route("/verify-code", post(verify_code))
        .route("/change-password", post(change_password))
}

// --- Handlers ---

/// Register a phone account with a password.
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    tag = AUTH_TAG,
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupResponse),
        (status = 400, description = "Missing field or duplicate phone/username", body = ErrorBody),
    ),
)]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let signup_mode = match required(body.signup_mode, "signup_mode")?.as_str() {
        "phone" => SignupMode::Phone,
        "kakao" => SignupMode::Kakao,
        _ => return Err(AppError::bad_request("signup_mode must be phone or kakao")),
    };
    let username = required(body.username, "username")?;
    let phone = normalize_phone(&required(body.phone, "phone")?);
    let password = body
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::bad_request("password is required"))?;
    let preferred_mode = parse_mode(body.preferred_mode.as_deref())?.unwrap_or(PreferredMode::Normal);
    let name = optional(body.name);
    let profile_image = optional(body.profile_image);

    let conn = state.db.get()?;
    accounts::ensure_unique(&conn, &phone, &username)?;

    let hash = accounts::hash_password(&password, state.config.auth.bcrypt_cost)?;
    let user = accounts::insert_user(
        &conn,
        &NewUser {
            signup_mode,
            username: &username,
            password_hash: Some(&hash),
            name: name.as_deref(),
            phone: &phone,
            profile_image: profile_image.as_deref(),
            preferred_mode,
            kakao_user_id: None,
        },
    )?;
    let tokens = token::issue_token(&state.config.auth, user.id)?;

    tracing::info!("User signed up: {} ({})", user.username, user.id);
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            success: true,
            message: "Signup completed".to_string(),
            data: AuthData { user, tokens },
        }),
    ))
}

/// Log in with phone number and password.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = AUTH_TAG,
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Unknown phone or wrong password", body = ErrorBody),
    ),
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let phone = normalize_phone(&required(body.phone, "phone")?);
    let password = body
        .password
        .ok_or_else(|| AppError::bad_request("password is required"))?;

    let conn = state.db.get()?;
    let mut user = accounts::find_active_by_phone(&conn, &phone)?
        .ok_or_else(|| AppError::bad_request("Phone number is not registered"))?;

    if !accounts::password_matches(&password, user.password_hash.as_deref()) {
        return Err(AppError::bad_request("Password does not match"));
    }

    accounts::touch_login(&conn, &mut user, None)?;
    let token = token::issue_token(&state.config.auth, user.id)?;
    tracing::info!("User logged in: {}", user.id);
    Ok(Json(LoginResponse::new(&user, token)))
}

/// Log in with a Kakao access token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/kakao/login",
    tag = AUTH_TAG,
    request_body = KakaoLoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Kakao rejected the access token", body = ErrorBody),
        (status = 404, description = "No linked account; sign up first", body = KakaoSignupNeeded),
    ),
)]
pub async fn kakao_login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<KakaoLoginRequest>,
) -> AppResult<Response> {
    kakao_login_as(&state, body, None).await
}

/// Shared Kakao login; `mode` switches the account's preferred mode.
pub async fn kakao_login_as(
    state: &AppState,
    body: KakaoLoginRequest,
    mode: Option<PreferredMode>,
) -> AppResult<Response> {
    let access_token = required(body.access_token, "access_token")?;
    let kakao_user = state.kakao.user_info(&access_token).await?;

    let conn = state.db.get()?;
    let Some(mut user) = accounts::find_active_by_kakao_id(&conn, &kakao_user.kakao_id)? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(KakaoSignupNeeded {
                success: false,
                message: "No account is linked to this Kakao user".to_string(),
                needs_signup: true,
                kakao_user,
            }),
        )
            .into_response());
    };

    accounts::touch_login(&conn, &mut user, mode)?;
    let token = token::issue_token(&state.config.auth, user.id)?;
    tracing::info!("Kakao login: user {}", user.id);
    Ok(Json(LoginResponse::new(&user, token)).into_response())
}

/// Create an account linked to a Kakao user.
#[utoipa::path(
    post,
    path = "/api/v1/auth/kakao/signup",
    tag = AUTH_TAG,
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
    kakao_signup_as(&state, body, PreferredMode::Normal).await
}

pub async fn kakao_signup_as(
    state: &AppState,
    body: KakaoSignupRequest,
    mode: PreferredMode,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let access_token = required(body.access_token, "access_token")?;
    let username = required(body.username, "username")?;
    let phone = normalize_phone(&required(body.phone, "phone")?);

    let kakao_user = state.kakao.user_info(&access_token).await?;
    let name = optional(body.name)
        .or_else(|| kakao_user.nickname.clone())
        .unwrap_or_else(|| username.clone());

    let conn = state.db.get()?;
    if accounts::kakao_id_taken(&conn, &kakao_user.kakao_id)? {
        return Err(AppError::bad_request("This Kakao account is already registered"));
    }
    accounts::ensure_unique(&conn, &phone, &username)?;

    let user = accounts::insert_user(
        &conn,
        &NewUser {
            signup_mode: SignupMode::Kakao,
            username: &username,
            password_hash: None,
            name: Some(&name),
            phone: &phone,
            profile_image: kakao_user.profile_image.as_deref(),
            preferred_mode: mode,
            kakao_user_id: Some(&kakao_user.kakao_id),
        },
    )?;
    let tokens = token::issue_token(&state.config.auth, user.id)?;

    tracing::info!("Kakao signup: {} ({})", user.username, user.id);
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            success: true,
            message: "Signup completed".to_string(),
            data: AuthData { user, tokens },
        }),
    ))
}

/// The authenticated user's account.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = AUTH_TAG,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
)]
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<MeResponse>> {
    let conn = state.db.get()?;
    let user = accounts::find_by_id(&conn, user.id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(MeResponse {
        success: true,
        data: MeData { user },
    }))
}

/// Text a six-digit verification code to a phone number.
#[utoipa::path(
    post,
    path = "/api/v1/auth/send-code",
    tag = AUTH_TAG,
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 400, description = "Missing phone or already registered", body = ErrorBody),
        (status = 404, description = "No account for password recovery", body = ErrorBody),
    ),
)]
pub async fn send_code(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SendCodeRequest>,
) -> AppResult<Json<MessageResponse>> {
    let phone = normalize_phone(&required(body.phone, "phone")?);

    {
        let conn = state.db.get()?;
        let purpose = body.purpose.as_deref();
        if purpose == Some("signup") && accounts::phone_taken(&conn, &phone)? {
            return Err(AppError::bad_request("Phone number is already registered"));
        }
        if purpose == Some("find_pw") && accounts::find_active_by_phone(&conn, &phone)?.is_none() {
            return Err(AppError::not_found("No account uses this phone number"));
        }
    }

    let code = state.codes.lock().await.issue(&phone);
    if let Err(e) = state.sms.send_code(&phone, &code).await {
        state.codes.lock().await.remove(&phone);
        return Err(e.into());
    }

    tracing::info!("Verification code issued for {}", mask_phone(&phone));
    Ok(Json(MessageResponse::ok("Verification code sent")))
}

/// Check a verification code without consuming it.
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-code",
    tag = AUTH_TAG,
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Code confirmed", body = MessageResponse),
        (status = 400, description = "Code missing, expired or wrong", body = ErrorBody),
    ),
)]
pub async fn verify_code(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<VerifyCodeRequest>,
) -> AppResult<Json<MessageResponse>> {
    let phone = normalize_phone(&required(body.phone, "phone")?);
    let code = required(body.code, "code")?;

    match state.codes.lock().await.verify(&phone, &code) {
        CodeCheck::Ok => Ok(Json(MessageResponse::ok(CodeCheck::Ok.message()))),
        failed => Err(AppError::bad_request(failed.message())),
    }
}

/// Change a password with the current one, or reset it with an SMS code.
#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = AUTH_TAG,
    request_body = ChangePasswordRequest,
    security((), ("bearer_auth" = [])),
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Wrong current password, bad code or weak password", body = ErrorBody),
        (status = 401, description = "Neither a token nor a phone code was given", body = ErrorBody),
        (status = 404, description = "No account for the phone number", body = ErrorBody),
    ),
)]
pub async fn change_password(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let new_password = body
        .new_password
        .ok_or_else(|| AppError::bad_request("newPassword is required"))?;
    if new_password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }

    let user_id = match (optional(body.phone), optional(body.code), user) {
        (Some(phone), Some(code), _) => {
            let phone = normalize_phone(&phone);
            let check = state.codes.lock().await.consume(&phone, &code);
            if check != CodeCheck::Ok {
                return Err(AppError::bad_request(check.message()));
            }
            let conn = state.db.get()?;
            accounts::find_active_by_phone(&conn, &phone)?
                .ok_or_else(|| AppError::not_found("No account uses this phone number"))?
                .id
        }
        (_, _, Some(user)) => {
            let current = body
                .current_password
                .ok_or_else(|| AppError::bad_request("currentPassword is required"))?;
            let conn = state.db.get()?;
            let account = accounts::find_by_id(&conn, user.id)?
                .ok_or_else(|| AppError::not_found("User not found"))?;
            if !accounts::password_matches(&current, account.password_hash.as_deref()) {
                return Err(AppError::bad_request("Current password does not match"));
            }
            account.id
        }
        _ => return Err(AppError::unauthorized("Token is missing")),
    };

    let hash = accounts::hash_password(&new_password, state.config.auth.bcrypt_cost)?;
    let conn = state.db.get()?;
    accounts::set_password(&conn, user_id, &hash)?;

    tracing::info!("Password changed for user {}", user_id);
    Ok(Json(MessageResponse::ok("Password changed")))
}

/// `None` when absent; 400 for anything other than `normal` or `senior`.
pub fn parse_mode(value: Option<&str>) -> AppResult<Option<PreferredMode>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => PreferredMode::parse(v)
            .map(Some)
            .ok_or_else(|| AppError::bad_request("preferred_mode must be normal or senior")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mode_accepts_known_values() {
        assert_eq!(parse_mode(None).unwrap(), None);
        assert_eq!(parse_mode(Some("")).unwrap(), None);
        assert_eq!(parse_mode(Some("senior")).unwrap(), Some(PreferredMode::Senior));
        assert!(parse_mode(Some("expert")).is_err());
    }

    #[test]
    fn send_code_request_reads_type_field() {
        let req: SendCodeRequest =
            serde_json::from_str(r#"{"phone":"010-1234-5678","type":"find_pw"}"#).unwrap();
        assert_eq!(req.purpose.as_deref(), Some("find_pw"));
    }

    #[test]
    fn change_password_request_is_camel_case() {
        let req: ChangePasswordRequest =
            serde_json::from_str(r#"{"currentPassword":"old","newPassword":"newpass"}"#).unwrap();
        assert_eq!(req.current_password.as_deref(), Some("old"));
        assert_eq!(req.new_password.as_deref(), Some("newpass"));
    }
}
