use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;

use super::ServiceError;
use crate::config::S3Config;

const DEFAULT_REGION: &str = "ap-northeast-2";

/// Where uploaded media ends up.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `bytes` under `key` and return the URL clients should use.
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>)
        -> Result<String, ServiceError>;
}

/// `{folder}/{uuid}.{ext}`
pub fn object_key(folder: &str, ext: &str) -> String {
    format!("{}/{}.{}", folder, uuid::Uuid::now_v7(), ext)
}

/// File extension from the uploaded filename, falling back to the content type.
pub fn extension_for(filename: Option<&str>, content_type: &str) -> String {
    let from_name = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });

    from_name.unwrap_or_else(|| {
        let known = match content_type {
            "image/jpeg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/gif" => Some("gif"),
            "image/webp" => Some("webp"),
            "image/heic" => Some("heic"),
            "video/mp4" => Some("mp4"),
            "video/quicktime" => Some("mov"),
            _ => None,
        };
        known
            .or_else(|| {
                mime_guess::get_mime_extensions_str(content_type)
                    .and_then(|exts| exts.first().copied())
            })
            .unwrap_or("bin")
            .to_string()
    })
}

/// Writes files under a directory that the router serves at `/uploads`.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(
        &self,
        key: &str,
        _content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ServiceError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(format!("/uploads/{}", key))
    }
}

pub struct S3MediaStore {
    client: Client,
    bucket: String,
    public_base_url: String,
    acl: Option<ObjectCannedAcl>,
}

impl S3MediaStore {
    pub async fn from_config(config: &S3Config) -> Result<Self, ServiceError> {
        let bucket = config
            .bucket
            .clone()
            .ok_or(ServiceError::NotConfigured("S3_BUCKET_NAME"))?;
        let region = config
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;

        let public_base_url = config
            .public_base_url
            .clone()
            .unwrap_or_else(|| default_public_url(&bucket, &region));

        Ok(Self {
            client: Client::new(&aws_config),
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            acl: config.acl.as_deref().map(ObjectCannedAcl::from),
        })
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }
}

pub fn default_public_url(bucket: &str, region: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com", bucket, region)
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ServiceError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes));
        if let Some(acl) = &self.acl {
            request = request.acl(acl.clone());
        }

        request
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("S3 upload failed: {}", e)))?;

        tracing::debug!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(format!("{}/{}", self.public_base_url, key))
    }
}
