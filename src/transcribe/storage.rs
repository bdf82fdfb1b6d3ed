use super::TranscribeError;
use crate::audio::AudioEncoding;
use crate::config::StorageConfig;
use tracing::{debug, info};

/// Blob storage contract for the long-running dispatch mode. The returned
/// location handle must be resolvable by the recognition provider without
/// re-upload.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<String, TranscribeError>;
}

/// Google Cloud Storage client using the JSON media-upload surface.
pub struct GcsBlobStore {
    http: reqwest::Client,
    config: StorageConfig,
}

impl GcsBlobStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Object names follow the original layout: prefix + timestamp + short
    /// random suffix + extension derived from the content type.
    fn object_name(&self, content_type: &str) -> String {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..7];
        let extension = AudioEncoding::from_mime(content_type).file_extension();
        format!(
            "{}{}-{}.{}",
            self.config.object_prefix, timestamp, suffix, extension
        )
    }
}

#[async_trait::async_trait]
impl BlobStore for GcsBlobStore {
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<String, TranscribeError> {
        let name = self.object_name(content_type);
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.config.endpoint,
            self.config.bucket,
            name.replace('/', "%2F"),
        );

        debug!(object = %name, bytes = bytes.len(), "uploading artifact");

        let response = self
            .http
            .post(&url)
            .header("content-type", content_type)
            .header(
                "x-goog-meta-retention-days",
                self.config.retention_days.to_string(),
            )
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| TranscribeError::Upload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Upload(format!(
                "upload rejected ({}): {}",
                status, body
            )));
        }

        let uri = format!("gs://{}/{}", self.config.bucket, name);
        info!(%uri, "artifact uploaded");
        Ok(uri)
    }
}
