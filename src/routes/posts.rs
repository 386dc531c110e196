use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::upload::{read_multipart, store_media, UploadedFile};
use super::{optional, parse_flag, required, MessageResponse};
use crate::db::models::PostType;
use crate::error::{AppError, AppResult, ErrorBody};
use crate::extractors::{ApiJson, ApiMultipart, ApiPath, CurrentUser};
use crate::feed::posts::{self as post_store, NewPost, MAX_IMAGES_PER_POST};
use crate::feed::{query, FeedItem, FeedMode, Page, PageQuery, PageRequest};
use crate::social::likes;
use crate::state::AppState;

pub const POSTS_TAG: &str = "posts";

#[derive(Debug, Deserialize, IntoParams)]
pub struct FeedQuery {
    /// `all` (default), `senior` or `normal`
    pub mode: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
}

/// Multipart body of `POST /posts`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CreatePostForm {
    pub content: Option<String>,
    /// `feed` (default) or `reel`
    #[schema(rename = "postType")]
    pub post_type: Option<String>,
    /// `true` or `false`
    #[schema(rename = "isSeniorMode")]
    pub is_senior_mode: Option<String>,
    /// Up to 10 image files
    #[schema(value_type = Vec<String>, format = Binary)]
    pub images: Vec<Vec<u8>>,
    /// One video file (required for reels)
    #[schema(value_type = Option<String>, format = Binary)]
    pub video: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostCreated {
    pub success: bool,
    pub message: String,
    pub post_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostResponse {
    pub success: bool,
    pub post: FeedItem,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub success: bool,
    pub message: String,
    pub like_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IsLikedResponse {
    pub success: bool,
    pub is_liked: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_post))
        .route("/feed", get(feed))
        .route("/reels", get(reels))
        .route("/seniorFeed", get(senior_feed))
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
        .route("/{id}/like", post(like_post).delete(unlike_post))
        .route("/{id}/is-liked", get(is_liked))
}

fn ensure_kind(files: &[UploadedFile], prefix: &str, what: &str) -> AppResult<()> {
    match files.iter().find(|f| !f.content_type.starts_with(prefix)) {
        Some(bad) => Err(AppError::bad_request(format!(
            "{} must be {} files (got {})",
            what, prefix, bad.content_type
        ))),
        None => Ok(()),
    }
}

/// Create a feed post or a reel.
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    tag = POSTS_TAG,
    request_body(content = CreatePostForm, content_type = "multipart/form-data"),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Post created", body = PostCreated),
        (status = 400, description = "Missing content/media or invalid files", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
)]
pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiMultipart(multipart): ApiMultipart,
) -> AppResult<(StatusCode, Json<PostCreated>)> {
    let mut form = read_multipart(multipart).await?;

    let post_type = match optional(form.field("postType")) {
        None => PostType::Feed,
        Some(value) => PostType::parse(&value)
            .ok_or_else(|| AppError::bad_request("postType must be feed or reel"))?,
    };
    let content = optional(form.field("content"));
    let is_senior_mode = parse_flag(form.field("isSeniorMode").as_deref());

    let images = form.take_files("images");
    let video = form.take_file("video");
    if images.len() > MAX_IMAGES_PER_POST {
        return Err(AppError::bad_request(format!(
            "At most {} images per post",
            MAX_IMAGES_PER_POST
        )));
    }
    ensure_kind(&images, "image/", "images")?;
    if let Some(video) = &video {
        ensure_kind(std::slice::from_ref(video), "video/", "video")?;
    }

    match post_type {
        PostType::Feed if content.is_none() && images.is_empty() => {
            return Err(AppError::bad_request("A post needs content or at least one image"));
        }
        PostType::Reel if video.is_none() => {
            return Err(AppError::bad_request("A reel needs a video file"));
        }
        _ => {}
    }

    let mut image_urls = Vec::with_capacity(images.len());
    for image in images {
        let processed = state.processor.image(image.into_media()).await;
        image_urls.push(store_media(&state, "images", processed).await?);
    }

    let (video_url, thumbnail_url) = match video {
        Some(video) => {
            let processed = state
                .processor
                .video(video.into_media(), post_type == PostType::Reel)
                .await;
            let video_url = store_media(&state, "videos", processed.video).await?;
            let thumbnail_url = match processed.thumbnail {
                Some(thumb) => Some(store_media(&state, "thumbnails", thumb).await?),
                None => None,
            };
            (Some(video_url), thumbnail_url)
        }
        None => (None, None),
    };

    let post_id = {
        let mut conn = state.db.get()?;
        post_store::create_post(
            &mut conn,
            &NewPost {
                author_id: user.id,
                post_type,
                content: content.as_deref(),
                is_senior_mode,
                image_urls: &image_urls,
                video_url: video_url.as_deref(),
                thumbnail_url: thumbnail_url.as_deref(),
            },
        )?
    };

    tracing::info!(
        "Post {} created by {} ({}, {} images)",
        post_id,
        user.id,
        post_type.as_str(),
        image_urls.len()
    );
    Ok((
        StatusCode::CREATED,
        Json(PostCreated {
            success: true,
            message: "Post created".to_string(),
            post_id,
        }),
    ))
}

/// Edit the text of one's own post.
#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}",
    tag = POSTS_TAG,
    params(("id" = i64, Path, description = "Post id")),
    request_body = UpdatePostRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Post updated", body = MessageResponse),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Post not found", body = ErrorBody),
    ),
)]
pub async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdatePostRequest>,
) -> AppResult<Json<MessageResponse>> {
    let content = required(body.content, "content")?;
    let conn = state.db.get()?;
    post_store::update_content(&conn, id, user.id, &content)?;
    Ok(Json(MessageResponse::ok("Post updated")))
}

/// Soft-delete one's own post.
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    tag = POSTS_TAG,
    params(("id" = i64, Path, description = "Post id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Post deleted", body = MessageResponse),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Post not found", body = ErrorBody),
    ),
)]
pub async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<MessageResponse>> {
    let conn = state.db.get()?;
    post_store::soft_delete(&conn, id, user.id)?;
    tracing::info!("Post {} deleted by {}", id, user.id);
    Ok(Json(MessageResponse::ok("Post deleted")))
}

/// Feed posts from the viewer and the accounts they follow.
#[utoipa::path(
    get,
    path = "/api/v1/posts/feed",
    tag = POSTS_TAG,
    params(FeedQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of the feed", body = Page<FeedItem>),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
)]
pub async fn feed(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<FeedQuery>,
) -> AppResult<Json<Page<FeedItem>>> {
    let mode = FeedMode::parse(params.mode.as_deref());
    let page = PageRequest::parse(params.page.as_deref(), params.size.as_deref());
    let conn = state.db.get()?;
    Ok(Json(query::list_feed(&conn, user.id, mode, page)?))
}

/// All reels, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/posts/reels",
    tag = POSTS_TAG,
    params(PageQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of reels", body = Page<FeedItem>),
    ),
)]
pub async fn reels(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<PageQuery>,
) -> AppResult<Json<Page<FeedItem>>> {
    let conn = state.db.get()?;
    Ok(Json(query::list_reels(&conn, user.id, (&params).into())?))
}

/// Senior-mode feed with a preview of recent comments.
#[utoipa::path(
    get,
    path = "/api/v1/posts/seniorFeed",
    tag = POSTS_TAG,
    params(PageQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of the senior feed", body = Page<FeedItem>),
    ),
)]
pub async fn senior_feed(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<PageQuery>,
) -> AppResult<Json<Page<FeedItem>>> {
    let conn = state.db.get()?;
    Ok(Json(query::list_senior_feed(&conn, user.id, (&params).into())?))
}

/// A single post.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    tag = POSTS_TAG,
    params(("id" = i64, Path, description = "Post id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The post", body = PostResponse),
        (status = 404, description = "Post not found", body = ErrorBody),
    ),
)]
pub async fn get_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<PostResponse>> {
    let conn = state.db.get()?;
    let post = query::get_post(&conn, user.id, id)?
        .ok_or_else(|| AppError::not_found("Post not found"))?;
    Ok(Json(PostResponse {
        success: true,
        post,
    }))
}

/// Like a post.
#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/like",
    tag = POSTS_TAG,
    params(("id" = i64, Path, description = "Post id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Liked", body = LikeResponse),
        (status = 400, description = "Already liked", body = ErrorBody),
        (status = 404, description = "Post not found", body = ErrorBody),
    ),
)]
pub async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<LikeResponse>> {
    let mut conn = state.db.get()?;
    let like_count = likes::like(&mut conn, id, user.id)?;
    Ok(Json(LikeResponse {
        success: true,
        message: "Post liked".to_string(),
        like_count,
    }))
}

/// Remove a like.
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}/like",
    tag = POSTS_TAG,
    params(("id" = i64, Path, description = "Post id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unliked", body = LikeResponse),
        (status = 400, description = "Not liked", body = ErrorBody),
        (status = 404, description = "Post not found", body = ErrorBody),
    ),
)]
pub async fn unlike_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<LikeResponse>> {
    let mut conn = state.db.get()?;
    let like_count = likes::unlike(&mut conn, id, user.id)?;
    Ok(Json(LikeResponse {
        success: true,
        message: "Like removed".to_string(),
        like_count,
    }))
}

/// Whether the viewer likes a post.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}/is-liked",
    tag = POSTS_TAG,
    params(("id" = i64, Path, description = "Post id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Like state", body = IsLikedResponse),
    ),
)]
pub async fn is_liked(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<IsLikedResponse>> {
    let conn = state.db.get()?;
    Ok(Json(IsLikedResponse {
        success: true,
        is_liked: likes::is_liked(&conn, id, user.id)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content_type: &str) -> UploadedFile {
        UploadedFile {
            field: "images".into(),
            file_name: Some("a".into()),
            content_type: content_type.into(),
            bytes: vec![1],
        }
    }

    #[test]
    fn ensure_kind_rejects_wrong_media() {
        assert!(ensure_kind(&[file("image/png"), file("image/jpeg")], "image/", "images").is_ok());
        assert!(matches!(
            ensure_kind(&[file("image/png"), file("video/mp4")], "image/", "images"),
            Err(AppError::BadRequest(_))
        ));
    }
}
