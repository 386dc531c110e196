use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::upload::{read_multipart, store_media};
use super::MessageResponse;
use crate::db::models::MediaType;
use crate::error::{AppError, AppResult, ErrorBody};
use crate::extractors::{ApiMultipart, ApiPath, CurrentUser};
use crate::social::stories::{self, StoryGroup, StoryViewer};
use crate::state::AppState;

pub const STORIES_TAG: &str = "stories";

/// Multipart body of `POST /stories`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct StoryForm {
    /// Image or video file
    #[schema(value_type = String, format = Binary)]
    pub media: Vec<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryCreated {
    pub success: bool,
    pub message: String,
    pub story_id: i64,
    pub media_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoriesResponse {
    pub success: bool,
    pub stories: Vec<StoryGroup>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IsMineResponse {
    pub success: bool,
    pub is_mine: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ViewersResponse {
    pub success: bool,
    pub viewers: Vec<StoryViewer>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_story).get(list_stories))
        .route("/ismine/{id}", get(is_mine))
        .route("/watch/{id}", post(watch))
        .route("/viewers/{id}", get(viewers))
}

/// Post a story that disappears after 24 hours.
#[utoipa::path(
    post,
    path = "/api/v1/stories",
    tag = STORIES_TAG,
    request_body(content = StoryForm, content_type = "multipart/form-data"),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Story created", body = StoryCreated),
        (status = 400, description = "Missing or unsupported file", body = ErrorBody),
    ),
)]
pub async fn create_story(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiMultipart(multipart): ApiMultipart,
) -> AppResult<(StatusCode, Json<StoryCreated>)> {
    let mut form = read_multipart(multipart).await?;
    let file = form
        .take_file("media")
        .ok_or_else(|| AppError::bad_request("media file is required"))?;
    let media_type = MediaType::from_content_type(&file.content_type)
        .ok_or_else(|| AppError::bad_request("Stories must be an image or a video"))?;

    let media_url = match media_type {
        MediaType::Image => {
            let processed = state.processor.image(file.into_media()).await;
            store_media(&state, "stories", processed).await?
        }
        MediaType::Video => {
            let processed = state.processor.video(file.into_media(), false).await;
            store_media(&state, "stories", processed.video).await?
        }
    };

    let story_id = {
        let conn = state.db.get()?;
        stories::create_story(&conn, user.id, &media_url, media_type)?
    };
    tracing::info!("Story {} posted by {}", story_id, user.id);

    Ok((
        StatusCode::CREATED,
        Json(StoryCreated {
            success: true,
            message: "Story created".to_string(),
            story_id,
            media_url,
        }),
    ))
}

/// Live stories of the caller and followed accounts, grouped by author.
#[utoipa::path(
    get,
    path = "/api/v1/stories",
    tag = STORIES_TAG,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Story groups", body = StoriesResponse),
    ),
)]
pub async fn list_stories(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<StoriesResponse>> {
    let conn = state.db.get()?;
    Ok(Json(StoriesResponse {
        success: true,
        stories: stories::list_story_groups(&conn, user.id)?,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/stories/ismine/{id}",
    tag = STORIES_TAG,
    params(("id" = i64, Path, description = "Story id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ownership", body = IsMineResponse),
        (status = 404, description = "Story not found", body = ErrorBody),
    ),
)]
pub async fn is_mine(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<IsMineResponse>> {
    let conn = state.db.get()?;
    Ok(Json(IsMineResponse {
        success: true,
        is_mine: stories::is_mine(&conn, id, user.id)?,
    }))
}

/// Mark a story as watched.
#[utoipa::path(
    post,
    path = "/api/v1/stories/watch/{id}",
    tag = STORIES_TAG,
    params(("id" = i64, Path, description = "Story id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "View recorded", body = MessageResponse),
        (status = 404, description = "Story missing or expired", body = ErrorBody),
    ),
)]
pub async fn watch(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<MessageResponse>> {
    let conn = state.db.get()?;
    stories::record_view(&conn, id, user.id)?;
    Ok(Json(MessageResponse::ok("View recorded")))
}

/// Who watched a story. Owner only.
#[utoipa::path(
    get,
    path = "/api/v1/stories/viewers/{id}",
    tag = STORIES_TAG,
    params(("id" = i64, Path, description = "Story id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Viewers, newest first", body = ViewersResponse),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Story not found", body = ErrorBody),
    ),
)]
pub async fn viewers(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<ViewersResponse>> {
    let conn = state.db.get()?;
    Ok(Json(ViewersResponse {
        success: true,
        viewers: stories::list_viewers(&conn, id, user.id)?,
    }))
}
