//! File-and-URL backed knowledge source.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use steward_config::KnowledgeConfig;
use steward_core::answer::is_url;
use steward_core::error::KnowledgeError;
use steward_core::knowledge::KnowledgeSource;
use tracing::{debug, warn};

/// Reads the index and file sources from disk, fetches URL sources over HTTP.
pub struct FileSystemKnowledge {
    index_path: PathBuf,
    sources_dir: PathBuf,
    max_source_bytes: usize,
    client: reqwest::Client,
}

impl FileSystemKnowledge {
    pub fn new(
        index_path: impl Into<PathBuf>,
        sources_dir: impl Into<PathBuf>,
        fetch_timeout: Duration,
    ) -> Result<Self, KnowledgeError> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| KnowledgeError::FetchFailed {
                url: String::new(),
                reason: format!("HTTP client: {e}"),
            })?;

        Ok(Self {
            index_path: index_path.into(),
            sources_dir: sources_dir.into(),
            max_source_bytes: 200_000,
            client,
        })
    }

    pub fn from_config(config: &KnowledgeConfig) -> Result<Self, KnowledgeError> {
        Ok(Self::new(
            &config.index_path,
            &config.sources_dir,
            Duration::from_secs(config.load_timeout_secs),
        )?
        .with_max_source_bytes(config.max_source_bytes))
    }

    pub fn with_max_source_bytes(mut self, max: usize) -> Self {
        self.max_source_bytes = max;
        self
    }

    /// Resolve a relative identifier inside the sources directory.
    ///
    /// Absolute paths and any `..` component are rejected.
    fn resolve_path(&self, source_id: &str) -> Result<PathBuf, KnowledgeError> {
        let relative = Path::new(source_id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if source_id.trim().is_empty() || escapes {
            return Err(KnowledgeError::InvalidIdentifier(source_id.to_string()));
        }
        Ok(self.sources_dir.join(relative))
    }

    async fn load_file(&self, source_id: &str) -> Result<Option<String>, KnowledgeError> {
        let path = self.resolve_path(source_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Knowledge source not found");
                Ok(None)
            }
            Err(e) => Err(KnowledgeError::ReadFailed {
                source_id: source_id.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn load_url(&self, url: &str) -> Result<Option<String>, KnowledgeError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                KnowledgeError::Timeout(url.to_string())
            } else {
                KnowledgeError::FetchFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        // Client errors other than throttling will not change on retry.
        if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(KnowledgeError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(KnowledgeError::FetchFailed {
                url: url.to_string(),
                reason: format!("status {}", status.as_u16()),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| KnowledgeError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(text))
    }
}

#[async_trait]
impl KnowledgeSource for FileSystemKnowledge {
    async fn get_index_text(&self) -> Result<String, KnowledgeError> {
        match tokio::fs::read_to_string(&self.index_path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.index_path.display(), "Knowledge index missing");
                Ok(String::new())
            }
            Err(e) => Err(KnowledgeError::ReadFailed {
                source_id: self.index_path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn load_source(&self, source_id: &str) -> Result<Option<String>, KnowledgeError> {
        let source_id = source_id.trim();
        let text = if is_url(source_id) {
            self.load_url(source_id).await?
        } else {
            self.load_file(source_id).await?
        };
        Ok(text.map(|t| truncate_bytes(t, self.max_source_bytes)))
    }
}

/// Cut a string to at most `max` bytes on a char boundary.
fn truncate_bytes(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}
