use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header;
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::optional;
use super::upload::read_multipart;
use crate::error::{AppError, AppResult, ErrorBody};
use crate::extractors::{ApiJson, CurrentUser};
use crate::services::caption::CaptionRequest;
use crate::state::AppState;

pub const AI_TAG: &str = "ai";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefineRequest {
    pub text: Option<String>,
    /// kind, cute, letter, friend, daily, greeting, family, thanks, memory,
    /// cheer, light, intro or default
    pub theme: Option<String>,
    /// Image URL or `data:` URL
    pub image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefineResponse {
    pub success: bool,
    pub result: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/refine", post(refine))
}

pub fn data_url(content_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        content_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

async fn caption_request(state: &AppState, request: Request) -> AppResult<CaptionRequest> {
    if is_multipart(&request) {
        let multipart = Multipart::from_request(request, state).await?;
        let mut form = read_multipart(multipart).await?;
        let image_url = match form.take_file("image") {
            Some(file) if file.content_type.starts_with("image/") => {
                Some(data_url(&file.content_type, &file.bytes))
            }
            Some(_) => return Err(AppError::bad_request("image must be an image file")),
            None => None,
        };
        Ok(CaptionRequest {
            text: optional(form.field("text")),
            theme: optional(form.field("theme")),
            image_url,
        })
    } else {
        let ApiJson(body) = ApiJson::<RefineRequest>::from_request(request, state).await?;
        Ok(CaptionRequest {
            text: optional(body.text),
            theme: optional(body.theme),
            image_url: optional(body.image),
        })
    }
}

/// Turn a short note and/or a photo into a social-media caption.
#[utoipa::path(
    post,
    path = "/api/v1/ai/refine",
    tag = AI_TAG,
    request_body(
        content(
            (RefineRequest = "application/json"),
            (RefineRequest = "multipart/form-data"),
        )
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Generated caption", body = RefineResponse),
        (status = 400, description = "Neither text nor image", body = ErrorBody),
        (status = 500, description = "Caption service failed or is not configured", body = ErrorBody),
    ),
)]
pub async fn refine(
    State(state): State<AppState>,
    user: CurrentUser,
    request: Request,
) -> AppResult<Json<RefineResponse>> {
    let caption = caption_request(&state, request).await?;
    if caption.text.is_none() && caption.image_url.is_none() {
        return Err(AppError::bad_request("Provide text or an image"));
    }

    tracing::debug!(
        "Caption requested by {} (theme {:?}, image: {})",
        user.id,
        caption.theme,
        caption.image_url.is_some()
    );
    let result = state.captioner.generate(&caption).await?;
    Ok(Json(RefineResponse {
        success: true,
        result,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_embeds_base64() {
        assert_eq!(data_url("image/png", b"hi"), "data:image/png;base64,aGk=");
    }
}
