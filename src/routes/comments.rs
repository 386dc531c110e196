use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::{parse_id, MessageResponse};
use crate::error::{AppError, AppResult, ErrorBody};
use crate::extractors::{ApiJson, ApiPath, CurrentUser};
use crate::feed::parse_and_format_time;
use crate::social::comments::{self, CommentRow};
use crate::state::AppState;

pub const COMMENTS_TAG: &str = "comments";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    /// Number or numeric string
    #[schema(value_type = i64)]
    pub post_id: Option<Value>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedComment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentCreated {
    pub message: String,
    pub comment: CreatedComment,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentUser {
    pub id: i64,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostComment {
    pub id: i64,
    pub post_id: i64,
    pub text: String,
    pub created_at: String,
    /// Relative time such as `5분 전`
    pub time: String,
    pub user: CommentUser,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostComments {
    pub post_id: i64,
    pub comments: Vec<PostComment>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_comment))
        .route("/{id}", delete(delete_comment))
        .route("/post/{post_id}", get(list_post_comments))
}

impl From<CommentRow> for PostComment {
    fn from(c: CommentRow) -> Self {
        PostComment {
            time: parse_and_format_time(&c.created_at),
            id: c.id,
            post_id: c.post_id,
            text: c.content,
            created_at: c.created_at,
            user: CommentUser {
                id: c.author_id,
                name: c.author_name.unwrap_or(c.author_username),
                avatar: c.author_profile_image,
            },
        }
    }
}

/// Add a comment to a post.
#[utoipa::path(
    post,
    path = "/api/v1/comments",
    tag = COMMENTS_TAG,
    request_body = CreateCommentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Comment created", body = CommentCreated),
        (status = 400, description = "Invalid post id or blank content", body = ErrorBody),
        (status = 404, description = "Post not found", body = ErrorBody),
    ),
)]
pub async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentCreated>)> {
    let post_id = parse_id(body.post_id.as_ref())
        .ok_or_else(|| AppError::bad_request("Invalid post id"))?;
    let mut conn = state.db.get()?;
    let row = comments::create_comment(
        &mut conn,
        post_id,
        user.id,
        body.content.as_deref().unwrap_or_default(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(CommentCreated {
            message: "Comment created".to_string(),
            comment: CreatedComment {
                id: row.id,
                post_id: row.post_id,
                user_id: row.author_id,
                text: row.content,
                created_at: row.created_at,
            },
        }),
    ))
}

/// Delete one's own comment.
#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    tag = COMMENTS_TAG,
    params(("id" = i64, Path, description = "Comment id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Comment deleted", body = MessageResponse),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Comment not found", body = ErrorBody),
    ),
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<MessageResponse>> {
    let mut conn = state.db.get()?;
    comments::delete_comment(&mut conn, id, user.id)?;
    Ok(Json(MessageResponse::ok("Comment deleted")))
}

/// Comments on a post, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/comments/post/{post_id}",
    tag = COMMENTS_TAG,
    params(("post_id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Comments", body = PostComments),
    ),
)]
pub async fn list_post_comments(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
) -> AppResult<Json<PostComments>> {
    let conn = state.db.get()?;
    let comments = comments::list_comments(&conn, post_id)?
        .into_iter()
        .map(PostComment::from)
        .collect();
    Ok(Json(PostComments { post_id, comments }))
}
