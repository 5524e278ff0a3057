//! Hand-off point for team answers worth keeping.

use async_trait::async_trait;
use steward_core::message::GatheredContext;
use tracing::info;

/// Receives exchanges between community members and the team.
#[async_trait]
pub trait CaptureSink: Send + Sync {
    async fn capture(&self, context: &GatheredContext);
}

/// Logs captured exchanges and keeps nothing.
pub struct LogCaptureSink;

#[async_trait]
impl CaptureSink for LogCaptureSink {
    async fn capture(&self, context: &GatheredContext) {
        let messages: usize = context.reply_chain.iter().map(|g| g.messages.len()).sum();
        info!(
            anchor = context.anchor().map(|m| m.id.as_str()).unwrap_or_default(),
            groups = context.reply_chain.len(),
            messages,
            "Q&A exchange captured"
        );
    }
}
