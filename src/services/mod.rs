pub mod caption;
pub mod kakao;
pub mod sms;
pub mod storage;
pub mod transcode;

use std::sync::Arc;

use crate::config::{Config, SmsProvider, StorageBackend};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// The upstream refused the caller's credentials.
    #[error("Rejected by upstream: {0}")]
    Rejected(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// External collaborators built from configuration.
pub struct Services {
    pub sms: Arc<dyn sms::SmsSender>,
    pub kakao: Arc<dyn kakao::KakaoApi>,
    pub captioner: Arc<dyn caption::CaptionGenerator>,
    pub media: Arc<dyn storage::MediaStore>,
    pub processor: Arc<transcode::MediaProcessor>,
}

impl Services {
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let sms: Arc<dyn sms::SmsSender> = match config.sms.provider {
            SmsProvider::Solapi => {
                tracing::info!("SMS provider: solapi");
                Arc::new(sms::SolapiSender::new(http.clone(), &config.sms)?)
            }
            SmsProvider::Log => {
                tracing::info!("SMS provider: log (codes are written to the log)");
                Arc::new(sms::LogSmsSender)
            }
        };

        let media: Arc<dyn storage::MediaStore> = match config.storage.backend {
            StorageBackend::S3 => {
                let store = storage::S3MediaStore::from_config(&config.storage.s3).await?;
                tracing::info!("Media storage: s3 ({})", store.public_base_url());
                Arc::new(store)
            }
            StorageBackend::Local => {
                let root = config.uploads_path();
                tracing::info!("Media storage: local ({})", root.display());
                Arc::new(storage::LocalMediaStore::new(root))
            }
        };

        Ok(Services {
            sms,
            kakao: Arc::new(kakao::KakaoClient::new(
                http.clone(),
                config.kakao.user_info_url.clone(),
            )),
            captioner: Arc::new(caption::OpenAiCaptioner::new(http, config.openai.clone())),
            media,
            processor: Arc::new(transcode::MediaProcessor::new(config.media.clone())),
        })
    }
}
