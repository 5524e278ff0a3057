//! Error types for the Steward domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator has its own error enum; the retry policy asks each of
//! them whether a failure is worth another attempt.

use thiserror::Error;

// --- Collaborator errors ---

/// Failures reported by the language-model collaborator.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed request: {0}")]
    InvalidRequest(String),

    #[error("Response failed schema validation: {0}")]
    Schema(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Timeouts, rate limits, network failures and 5xx responses are
    /// transient; validation, auth and malformed requests are not.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::AuthenticationFailed(_)
            | Self::InvalidRequest(_)
            | Self::Schema(_)
            | Self::NotConfigured(_) => false,
        }
    }
}

/// Failures reported by the chat gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Message not found: {0}")]
    NotFound(String),

    #[error("Gateway request failed: {0}")]
    RequestFailed(String),

    #[error("Gateway timed out: {0}")]
    Timeout(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Gateway connection lost: {0}")]
    ConnectionLost(String),
}

impl GatewayError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ConnectionLost(_) | Self::RequestFailed(_))
    }
}

/// Failures reported by the knowledge source.
#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("Failed to read source {source_id}: {reason}")]
    ReadFailed { source_id: String, reason: String },

    #[error("Failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Invalid source identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Fetch of {url} rejected with status {status}")]
    Rejected { url: String, status: u16 },

    #[error("Knowledge request timed out: {0}")]
    Timeout(String),
}

impl KnowledgeError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::Timeout(_))
    }
}

/// Failures while downloading an image attachment.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("Image download failed with status {status} ({url})")]
    Status { url: String, status: u16 },

    #[error("Image download returned empty content ({0})")]
    Empty(String),

    #[error("Image download failed ({url}): {reason}")]
    Transport { url: String, reason: String },
}
