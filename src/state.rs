use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::auth::verification::VerificationStore;
use crate::config::Config;
use crate::services::caption::CaptionGenerator;
use crate::services::kakao::KakaoApi;
use crate::services::sms::SmsSender;
use crate::services::storage::MediaStore;
use crate::services::transcode::MediaProcessor;
use crate::services::Services;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub codes: Arc<Mutex<VerificationStore>>,
    pub sms: Arc<dyn SmsSender>,
    pub kakao: Arc<dyn KakaoApi>,
    pub captioner: Arc<dyn CaptionGenerator>,
    pub media: Arc<dyn MediaStore>,
    pub processor: Arc<MediaProcessor>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, services: Services) -> Self {
        AppState {
            db,
            config,
            codes: Arc::new(Mutex::new(VerificationStore::new())),
            sms: services.sms,
            kakao: services.kakao,
            captioner: services.captioner,
            media: services.media,
            processor: services.processor,
        }
    }
}
