use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ServiceError;

/// Profile returned by Kakao for a user access token.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KakaoUser {
    pub kakao_id: String,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub profile_image: Option<String>,
    #[serde(skip)]
    pub phone_number: Option<String>,
}

#[async_trait]
pub trait KakaoApi: Send + Sync {
    async fn user_info(&self, access_token: &str) -> Result<KakaoUser, ServiceError>;
}

pub struct KakaoClient {
    http: reqwest::Client,
    user_info_url: String,
}

#[derive(Deserialize)]
struct UserMeResponse {
    id: i64,
    #[serde(default)]
    kakao_account: Option<KakaoAccount>,
}

#[derive(Deserialize)]
struct KakaoAccount {
    email: Option<String>,
    phone_number: Option<String>,
    profile: Option<KakaoProfile>,
}

#[derive(Deserialize)]
struct KakaoProfile {
    nickname: Option<String>,
    profile_image_url: Option<String>,
}

impl From<UserMeResponse> for KakaoUser {
    fn from(me: UserMeResponse) -> Self {
        let account = me.kakao_account;
        let (nickname, profile_image) = match account.as_ref().and_then(|a| a.profile.as_ref()) {
            Some(p) => (p.nickname.clone(), p.profile_image_url.clone()),
            None => (None, None),
        };
        KakaoUser {
            kakao_id: me.id.to_string(),
            email: account.as_ref().and_then(|a| a.email.clone()),
            nickname,
            profile_image,
            phone_number: account.and_then(|a| a.phone_number),
        }
    }
}

impl KakaoClient {
    pub fn new(http: reqwest::Client, user_info_url: String) -> Self {
        Self {
            http,
            user_info_url,
        }
    }
}

#[async_trait]
impl KakaoApi for KakaoClient {
    async fn user_info(&self, access_token: &str) -> Result<KakaoUser, ServiceError> {
        let response = self
            .http
            .get(&self.user_info_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ServiceError::Rejected(
                "Kakao access token is invalid or expired".to_string(),
            ));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Upstream(format!(
                "Kakao user info returned {}: {}",
                status, error_text
            )));
        }

        let me: UserMeResponse = response.json().await?;
        Ok(me.into())
    }
}
