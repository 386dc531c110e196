use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::{ai, auth, comments, posts, senior, stories, users};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Senior SNS API",
        version = "1.0.0",
        description = "Social network backend for general and senior users: accounts, feed, reels, stories, comments, likes, follows and AI captions.",
    ),
    paths(
        auth::signup,
        auth::login,
        auth::kakao_login,
        auth::kakao_signup,
        auth::me,
        auth::send_code,
        auth::verify_code,
        auth::change_password,
        senior::phone_auth,
        senior::kakao_login,
        senior::kakao_signup,
        senior::home,
        senior::create_comment,
        senior::list_comments,
        posts::create_post,
        posts::update_post,
        posts::delete_post,
        posts::feed,
        posts::reels,
        posts::senior_feed,
        posts::get_post,
        posts::like_post,
        posts::unlike_post,
        posts::is_liked,
        comments::create_comment,
        comments::delete_comment,
        comments::list_post_comments,
        users::my_profile,
        users::user_profile,
        users::update_me,
        users::upload_profile_image,
        users::search,
        users::get_settings,
        users::update_settings,
        users::my_followers,
        users::my_following,
        users::remove_follower,
        users::unfollow_by_path,
        users::follow,
        users::unfollow,
        users::is_following,
        stories::create_story,
        stories::list_stories,
        stories::is_mine,
        stories::watch,
        stories::viewers,
        ai::refine,
    ),
    tags(
        (name = "auth", description = "Signup, login, Kakao and SMS verification"),
        (name = "senior", description = "Simplified entry points for senior mode"),
        (name = "posts", description = "Feed posts, reels and likes"),
        (name = "comments", description = "Comments on posts"),
        (name = "users", description = "Profiles, settings and follows"),
        (name = "stories", description = "24-hour stories"),
        (name = "ai", description = "AI caption generation"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

/// Swagger UI at `/api-docs`, raw document at `/api-docs.json`.
pub fn router() -> Router<AppState> {
    SwaggerUi::new("/api-docs")
        .url("/api-docs.json", ApiDoc::openapi())
        .into()
}
