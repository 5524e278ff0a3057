//! KnowledgeSource trait: index text and full source content.

use async_trait::async_trait;

use crate::error::KnowledgeError;

/// Read-only access to the knowledge base used for grounding answers.
///
/// The index is an opaque text blob the selection step reads; source
/// identifiers are whatever the index lists (file paths or URLs).
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// The current index text. Empty when no index exists yet.
    async fn get_index_text(&self) -> Result<String, KnowledgeError>;

    /// Full content for one identifier. `Ok(None)` means not found.
    async fn load_source(&self, source_id: &str) -> Result<Option<String>, KnowledgeError>;
}
