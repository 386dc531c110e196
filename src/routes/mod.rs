pub mod ai;
pub mod auth;
pub mod comments;
pub mod docs;
pub mod posts;
pub mod senior;
pub mod stories;
pub mod upload;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Plain `{success, message}` acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let max_body = state.config.server.max_body_mb * 1024 * 1024;
    let uploads = ServeDir::new(state.config.uploads_path());

    Router::new()
        .route("/", get(index))
        .nest("/api/v1/auth", auth::router())
        .nest("/api/v1/senior", senior::router())
        .nest("/api/v1/posts", posts::router())
        .nest("/api/v1/comments", comments::router())
        .nest("/api/v1/users", users::router())
        .nest("/api/v1/stories", stories::router())
        .nest("/api/v1/ai", ai::router())
        .nest_service("/uploads", uploads)
        .merge(docs::router())
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> &'static str {
    "Senior SNS API Server is running..."
}

/// Trimmed, non-empty value of a required field.
pub fn required(value: Option<String>, field: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("{} is required", field)))
}

/// Trimmed value of an optional field; blank reads as absent.
pub fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Lenient boolean for form fields such as `isSeniorMode`.
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true") | Some("1") | Some("on") | Some("yes")
    )
}

/// Positive id from a JSON number or numeric string.
pub fn parse_id(value: Option<&Value>) -> Option<i64> {
    let id = match value? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (id > 0).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        assert_eq!(parse_id(Some(&json!(7))), Some(7));
        assert_eq!(parse_id(Some(&json!(" 12 "))), Some(12));
        assert_eq!(parse_id(Some(&json!("abc"))), None);
        assert_eq!(parse_id(Some(&json!(0))), None);
        assert_eq!(parse_id(Some(&json!(1.5))), None);
        assert_eq!(parse_id(None), None);
    }

    #[test]
    fn required_rejects_missing_and_blank() {
        assert!(matches!(required(None, "phone"), Err(AppError::BadRequest(m)) if m == "phone is required"));
        assert!(required(Some("   ".into()), "phone").is_err());
        assert_eq!(required(Some(" 010 ".into()), "phone").unwrap(), "010");
    }

    #[test]
    fn optional_treats_blank_as_none() {
        assert_eq!(optional(Some("  ".into())), None);
        assert_eq!(optional(Some(" hi ".into())).as_deref(), Some("hi"));
    }

    #[test]
    fn flag_parsing_is_lenient() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("TRUE")));
        assert!(parse_flag(Some("1")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(None));
    }
}
