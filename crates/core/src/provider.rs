//! AnswerModel trait: the language-model capabilities the orchestrator uses.
//!
//! Each capability is a single structured call. The orchestrator wraps
//! every call with its own timeout and retry policy, so implementations
//! should make exactly one attempt and report failures faithfully
//! (see [`ProviderError::is_retriable`]).

use async_trait::async_trait;

use crate::answer::{Draft, GateDecision, LoadedSource, VerificationResult};
use crate::conversation::Conversation;
use crate::error::ProviderError;

#[async_trait]
pub trait AnswerModel: Send + Sync {
    /// A human-readable name for logs (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Decide whether the conversation holds an answerable question.
    async fn gate(&self, conversation: &Conversation, prompt: &str)
    -> Result<GateDecision, ProviderError>;

    /// Pick source identifiers from the index text for a query.
    async fn select(
        &self,
        query: &str,
        index_text: &str,
        prompt: &str,
    ) -> Result<Vec<String>, ProviderError>;

    /// Draft an answer grounded in the loaded sources.
    async fn generate(
        &self,
        conversation: &Conversation,
        sources: &[LoadedSource],
        prompt: &str,
    ) -> Result<Draft, ProviderError>;

    /// Independently judge a draft before it is published.
    async fn verify(
        &self,
        draft: &str,
        sources: &[LoadedSource],
        prompt: &str,
    ) -> Result<VerificationResult, ProviderError>;
}
