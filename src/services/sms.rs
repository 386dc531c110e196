use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::Serialize;
use sha2::Sha256;

use super::ServiceError;
use crate::auth::verification::mask_phone;
use crate::config::SmsConfig;

type HmacSha256 = Hmac<Sha256>;

/// Delivers verification codes by text message.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_code(&self, to: &str, code: &str) -> Result<(), ServiceError>;
}

pub fn code_message(code: &str) -> String {
    format!("[유니젠] 인증번호는 {}입니다.", code)
}

/// Development sender that only logs the code.
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_code(&self, to: &str, code: &str) -> Result<(), ServiceError> {
        tracing::info!("SMS to {}: {}", mask_phone(to), code_message(code));
        Ok(())
    }
}

pub struct SolapiSender {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    from: String,
    base_url: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Serialize)]
struct Message<'a> {
    to: &'a str,
    from: &'a str,
    text: String,
}

impl SolapiSender {
    pub fn new(http: reqwest::Client, config: &SmsConfig) -> Result<Self, ServiceError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ServiceError::NotConfigured("SOLAPI_API_KEY"))?;
        let api_secret = config
            .api_secret
            .clone()
            .ok_or(ServiceError::NotConfigured("SOLAPI_API_SECRET"))?;
        let from = config
            .from_number
            .clone()
            .ok_or(ServiceError::NotConfigured("SOLAPI_FROM_NUMBER"))?;

        Ok(Self {
            http,
            api_key,
            api_secret,
            from,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn authorization(&self) -> Result<String, ServiceError> {
        let date = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let salt = hex::encode(rand::thread_rng().gen::<[u8; 16]>());
        authorization_header(&self.api_key, &self.api_secret, &date, &salt)
    }
}

/// `HMAC-SHA256 apiKey=.., date=.., salt=.., signature=hex(hmac(secret, date + salt))`
pub fn authorization_header(
    api_key: &str,
    api_secret: &str,
    date: &str,
    salt: &str,
) -> Result<String, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .map_err(|e| ServiceError::Upstream(format!("Invalid Solapi secret: {}", e)))?;
    mac.update(date.as_bytes());
    mac.update(salt.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!(
        "HMAC-SHA256 apiKey={}, date={}, salt={}, signature={}",
        api_key, date, salt, signature
    ))
}

#[async_trait]
impl SmsSender for SolapiSender {
    async fn send_code(&self, to: &str, code: &str) -> Result<(), ServiceError> {
        let body = SendRequest {
            message: Message {
                to,
                from: &self.from,
                text: code_message(code),
            },
        };

        let response = self
            .http
            .post(format!("{}/messages/v4/send", self.base_url))
            .header(reqwest::header::AUTHORIZATION, self.authorization()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Upstream(format!(
                "Solapi returned {}: {}",
                status, error_text
            )));
        }

        tracing::info!("Verification SMS sent to {}", mask_phone(to));
        Ok(())
    }
}
