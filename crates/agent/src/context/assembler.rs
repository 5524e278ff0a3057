//! Gathered context → conversation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use steward_core::conversation::{Conversation, ConversationMessage, ImageFetcher, ImagePayload, Role};
use steward_core::message::{AuthorKind, GatheredContext, Identities, Message};
use tracing::{debug, warn};

/// Why a conversation could not be built.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// Every image the conversation needed failed to download.
    #[error("All {failed} image(s) failed to download")]
    ImagesUnavailable { failed: usize },

    /// Nothing usable was left after normalization.
    #[error("Conversation is empty after normalization")]
    Empty,
}

/// Builds conversations. Stateless apart from its collaborators; share one.
pub struct ConversationAssembler {
    identities: Identities,
    images: Option<Arc<dyn ImageFetcher>>,
}

impl ConversationAssembler {
    /// Text-only assembler. Image attachments are ignored.
    pub fn new(identities: Identities) -> Self {
        Self {
            identities,
            images: None,
        }
    }

    /// Enable image input through the given fetcher.
    pub fn with_images(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.images = Some(fetcher);
        self
    }

    /// Merge thread history, reply chain and batch into one conversation.
    ///
    /// Messages seen in more than one source appear once.
    pub async fn assemble(&self, context: &GatheredContext) -> Result<Conversation, AssemblyError> {
        let history = context.thread_history.iter().flatten();
        let chain = context.reply_chain.iter().flat_map(|g| g.messages.iter());
        let merged: Vec<&Message> = history.chain(chain).chain(context.batch.iter()).collect();
        self.normalize(merged).await
    }

    /// A conversation from one finalized batch alone.
    pub async fn assemble_batch(&self, batch: &[Message]) -> Result<Conversation, AssemblyError> {
        self.normalize(batch.iter().collect()).await
    }

    async fn normalize(&self, messages: Vec<&Message>) -> Result<Conversation, AssemblyError> {
        let mut seen = HashSet::new();
        let mut messages: Vec<&Message> = messages
            .into_iter()
            .filter(|m| seen.insert(m.id.as_str()))
            .collect();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        let images = self.fetch_images(&messages).await?;

        let conversation: Vec<ConversationMessage> = messages
            .into_iter()
            .filter_map(|m| {
                let text = m.text.trim().to_string();
                let attached: Vec<ImagePayload> = m
                    .images()
                    .filter_map(|a| images.get(a.url.as_str()).cloned())
                    .collect();
                if text.is_empty() && attached.is_empty() {
                    return None;
                }
                let role = match self.identities.kind_of(&m.author_id) {
                    AuthorKind::CommunityUser => Role::User,
                    AuthorKind::TeamMember | AuthorKind::Bot => Role::Assistant,
                };
                Some(ConversationMessage {
                    role,
                    text,
                    timestamp: m.timestamp,
                    author_id: Some(m.author_id.clone()),
                    images: attached,
                })
            })
            .collect();

        if conversation.is_empty() {
            return Err(AssemblyError::Empty);
        }
        debug!(messages = conversation.len(), "Conversation assembled");
        Ok(Conversation::new(conversation))
    }

    /// Download each distinct image once. Individual failures are skipped;
    /// losing every image aborts.
    async fn fetch_images(
        &self,
        messages: &[&Message],
    ) -> Result<HashMap<String, ImagePayload>, AssemblyError> {
        let Some(fetcher) = &self.images else {
            return Ok(HashMap::new());
        };

        let mut unique = HashSet::new();
        let attachments: Vec<_> = messages
            .iter()
            .flat_map(|m| m.images())
            .filter(|a| unique.insert(a.url.as_str()))
            .collect();
        if attachments.is_empty() {
            return Ok(HashMap::new());
        }

        let results = join_all(attachments.iter().map(|a| fetcher.fetch(a))).await;
        let mut fetched = HashMap::new();
        let mut failed = 0;
        for (attachment, result) in attachments.iter().zip(results) {
            match result {
                Ok(payload) => {
                    fetched.insert(attachment.url.clone(), payload);
                }
                Err(e) => {
                    warn!(url = %attachment.url, error = %e, "Skipping image");
                    failed += 1;
                }
            }
        }

        if fetched.is_empty() {
            return Err(AssemblyError::ImagesUnavailable { failed });
        }
        Ok(fetched)
    }
}
