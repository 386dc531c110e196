use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ServiceError;
use crate::config::OpenAiConfig;

/// Input for one caption: free text, an image as a `data:` URL, or both.
#[derive(Debug, Clone, Default)]
pub struct CaptionRequest {
    pub text: Option<String>,
    pub theme: Option<String>,
    pub image_url: Option<String>,
}

#[async_trait]
pub trait CaptionGenerator: Send + Sync {
    async fn generate(&self, request: &CaptionRequest) -> Result<String, ServiceError>;
}

/// Korean writing style for a caption theme.
pub fn style_prompt(theme: Option<&str>) -> &'static str {
    match theme.unwrap_or_default() {
        "kind" => "따뜻하고 온화한 존댓말 말투로, 이모티콘을 적절히 섞어서",
        "cute" => "귀엽고 애교 섞인 말투로, 밝은 느낌의 이모티콘을 많이 써서",
        "letter" => "사랑하는 손주에게 쓰는 편지 형식으로, 다정하고 진심 어린 말투로",
        "friend" => "친한 친구에게 말하듯 편안하고 활기찬 반말 말투로",
        "daily" => "오늘 하루를 기록하는 일기처럼 담담하고 소박한 말투로",
        "greeting" => "이웃과 지인에게 건네는 정중하고 반가운 안부 인사 말투로",
        "family" => "가족에게 이야기하듯 포근하고 정겨운 말투로",
        "thanks" => "고마운 마음이 잘 전해지도록 정중하고 따뜻한 감사의 말투로",
        "memory" => "지난 추억을 떠올리며 그리움이 묻어나는 잔잔한 말투로",
        "cheer" => "힘이 나도록 밝고 씩씩한 응원의 말투로",
        "light" => "짧고 가볍게, 부담 없이 읽히는 산뜻한 말투로",
        "intro" => "처음 인사하는 자리에서 자신을 소개하는 정중하고 친근한 말투로",
        _ => "인스타그램 감성의 트렌디하고 정갈한 말투로",
    }
}

/// Chat Completions `messages` for a caption request.
pub fn build_messages(request: &CaptionRequest) -> Value {
    let system = format!(
        "당신은 시니어 sns 인플루언서 도우미입니다. 사용자가 입력한 텍스트(혹은 사진 설명)를 \
         바탕으로 '{}' 게시글 내용을 작성해주세요. 해시태그도 3~5개 추천해주세요.",
        style_prompt(request.theme.as_deref())
    );

    let prompt = match request.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!("내용: {}", text),
        _ => "사진에 어울리는 좋은 글귀를 써줘.".to_string(),
    };

    let mut content = vec![json!({ "type": "text", "text": prompt })];
    if let Some(url) = &request.image_url {
        content.push(json!({
            "type": "image_url",
            "image_url": { "url": url, "detail": "low" }
        }));
    }

    json!([
        { "role": "system", "content": system },
        { "role": "user", "content": content }
    ])
}

pub struct OpenAiCaptioner {
    http: reqwest::Client,
    config: OpenAiConfig,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiCaptioner {
    pub fn new(http: reqwest::Client, config: OpenAiConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl CaptionGenerator for OpenAiCaptioner {
    async fn generate(&self, request: &CaptionRequest) -> Result<String, ServiceError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ServiceError::NotConfigured("OPENAI_API_KEY"))?;

        let body = json!({
            "model": self.config.model,
            "messages": build_messages(request),
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        tracing::debug!(
            "Requesting caption (theme={:?}, image={})",
            request.theme,
            request.image_url.is_some()
        );

        let response = self
            .http
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Upstream(format!(
                "OpenAI returned {}: {}",
                status, error_text
            )));
        }

        let result: CompletionResponse = response.json().await?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::Upstream("OpenAI returned no choices".to_string()))
    }
}
