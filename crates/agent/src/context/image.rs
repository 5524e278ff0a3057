//! HTTP image download for multimodal conversations.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use steward_config::ImageConfig;
use steward_core::conversation::{ImageFetcher, ImagePayload};
use steward_core::error::ImageError;
use steward_core::message::Attachment;
use tracing::debug;

use crate::retry::RetryPolicy;

const FALLBACK_MIME: &str = "image/jpeg";

/// Downloads attachments over HTTP and base64-encodes them.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImageError::Transport {
                url: String::new(),
                reason: format!("HTTP client: {e}"),
            })?;
        Ok(Self { client, retry })
    }

    pub fn from_config(config: &ImageConfig) -> Result<Self, ImageError> {
        let timeout = Duration::from_secs(config.download_timeout_secs);
        Self::new(
            timeout,
            RetryPolicy::new(config.download_max_retries.saturating_add(1), Duration::from_millis(500)),
        )
    }

    async fn download(&self, attachment: &Attachment) -> Result<ImagePayload, ImageError> {
        let url = attachment.url.as_str();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|e| ImageError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(ImageError::Empty(url.to_string()));
        }

        let mime_type = resolve_mime(header_mime.as_deref(), attachment.mime_type.as_deref());
        debug!(url, bytes = bytes.len(), mime = %mime_type, "Image downloaded");

        Ok(ImagePayload {
            base64_data: STANDARD.encode(&bytes),
            mime_type,
            source_url: url.to_string(),
            filename: attachment.filename.clone(),
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, attachment: &Attachment) -> Result<ImagePayload, ImageError> {
        self.retry
            .run("image_download", || self.download(attachment))
            .await
    }
}

/// Pick the image MIME type: response header, then the platform's report,
/// then JPEG.
fn resolve_mime(header: Option<&str>, reported: Option<&str>) -> String {
    let clean = |value: &str| {
        value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    };
    header
        .map(clean)
        .filter(|m| m.starts_with("image/"))
        .or_else(|| reported.map(clean).filter(|m| m.starts_with("image/")))
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}
