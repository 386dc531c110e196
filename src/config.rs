use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "senior-sns", about = "Senior SNS API server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub sms: SmsConfig,
    pub kakao: KakaoConfig,
    pub openai: OpenAiConfig,
    pub media: MediaConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_mb: usize,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for locally stored uploads, served at `/uploads`.
    pub path: Option<PathBuf>,
    pub s3: S3Config,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct S3Config {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub public_base_url: Option<String>,
    /// Canned ACL applied to uploaded objects. Leave unset for buckets with ACLs disabled.
    pub acl: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expires_secs: u64,
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmsProvider {
    /// Write codes to the log instead of sending them.
    #[default]
    Log,
    Solapi,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SmsConfig {
    pub provider: SmsProvider,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub from_number: Option<String>,
    pub base_url: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct KakaoConfig {
    pub user_info_url: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MediaConfig {
    pub transcode: bool,
    pub ffmpeg_path: String,
    pub max_image_width: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_body_mb: 50,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_expires_secs: 7 * 24 * 3600,
            bcrypt_cost: 10,
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            provider: SmsProvider::Log,
            api_key: None,
            api_secret: None,
            from_number: None,
            base_url: "https://api.solapi.com".to_string(),
        }
    }
}

impl Default for KakaoConfig {
    fn default() -> Self {
        Self {
            user_info_url: "https://kapi.kakao.com/v2/user/me".to_string(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 300,
            temperature: 0.7,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            transcode: false,
            ffmpeg_path: "ffmpeg".to_string(),
            max_image_width: 1080,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("senior_sns.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("uploads"));
        }

        if config.auth.jwt_secret.is_empty() {
            tracing::warn!("No JWT secret configured; issued tokens will not survive a restart");
            config.auth.jwt_secret = random_secret();
        }

        Ok(config)
    }

    /// Overlay secrets and deployment settings from environment variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(secret) = get("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(secs) = get("JWT_EXPIRES_SEC").and_then(|v| v.parse().ok()) {
            self.auth.jwt_expires_secs = secs;
        }
        if let Some(cost) = get("BCRYPT_SALT_ROUNDS").and_then(|v| v.parse().ok()) {
            self.auth.bcrypt_cost = cost;
        }
        if let Some(key) = get("SOLAPI_API_KEY") {
            self.sms.api_key = Some(key);
            self.sms.provider = SmsProvider::Solapi;
        }
        if let Some(secret) = get("SOLAPI_API_SECRET") {
            self.sms.api_secret = Some(secret);
        }
        if let Some(from) = get("SOLAPI_FROM_NUMBER") {
            self.sms.from_number = Some(from);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(bucket) = get("S3_BUCKET_NAME") {
            self.storage.s3.bucket = Some(bucket);
            self.storage.backend = StorageBackend::S3;
        }
        if let Some(region) = get("AWS_REGION") {
            self.storage.s3.region = Some(region);
        }
        if let Some(url) = get("S3_PUBLIC_BASE_URL") {
            self.storage.s3.public_base_url = Some(url);
        }
        if let Some(acl) = get("S3_OBJECT_ACL") {
            self.storage.s3.acl = Some(acl);
        }
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".senior-sns")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("senior_sns.db"))
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("uploads"))
    }
}

fn random_secret() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cli_for(dir: &std::path::Path) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(dir.to_path_buf()),
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.max_body_mb, 50);
        assert_eq!(config.auth.jwt_expires_secs, 604_800);
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.sms.provider, SmsProvider::Log);
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert!(config.database.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_for(std::path::Path::new("/tmp/test-senior-sns"));
        assert_eq!(
            Config::data_dir(&cli),
            PathBuf::from("/tmp/test-senior-sns")
        );
    }

    #[test]
    fn data_dir_defaults_to_home_dot_senior_sns() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
        };
        assert!(Config::data_dir(&cli).ends_with(".senior-sns"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_for(tmp.path())).unwrap();
        assert_eq!(config.db_path(), tmp.path().join("senior_sns.db"));
        assert_eq!(config.uploads_path(), tmp.path().join("uploads"));
        assert_eq!(config.auth.jwt_secret.len(), 64);
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "127.0.0.1"
port = 9000

[auth]
jwt_secret = "from-file"
jwt_expires_secs = 3600

[storage]
backend = "s3"

[storage.s3]
bucket = "media"
region = "ap-northeast-2"

[sms]
provider = "solapi"
api_key = "key"
"#,
        )
        .unwrap();

        let mut cli = cli_for(tmp.path());
        cli.config = Some(config_path);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.jwt_expires_secs, 3600);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.s3.bucket.as_deref(), Some("media"));
        assert_eq!(config.sms.provider, SmsProvider::Solapi);
        // The environment of the test runner may carry JWT_SECRET; only check it is set.
        assert!(!config.auth.jwt_secret.is_empty());
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[server]\nhost = \"192.168.1.1\"\nport = 9000\n").unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn env_overrides_secrets_and_backends() {
        let env: HashMap<&str, &str> = [
            ("JWT_SECRET", "env-secret"),
            ("JWT_EXPIRES_SEC", "120"),
            ("BCRYPT_SALT_ROUNDS", "4"),
            ("SOLAPI_API_KEY", "sms-key"),
            ("S3_BUCKET_NAME", "bucket"),
            ("AWS_REGION", "ap-northeast-2"),
            ("OPENAI_API_KEY", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.auth.jwt_secret, "env-secret");
        assert_eq!(config.auth.jwt_expires_secs, 120);
        assert_eq!(config.auth.bcrypt_cost, 4);
        assert_eq!(config.sms.provider, SmsProvider::Solapi);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.s3.region.as_deref(), Some("ap-northeast-2"));
        // Blank values are ignored
        assert!(config.openai.api_key.is_none());
    }
}
