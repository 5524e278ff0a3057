//! Message classification.
//!
//! Labels each incoming message with its author kind, location, reply
//! target and thread-owner kind. The reply target costs one gateway lookup;
//! everything else is derived from static identities.

use std::sync::Arc;

use steward_core::gateway::ChatGateway;
use steward_core::message::{
    AuthorKind, ClassifiedMessage, Identities, Location, Message, MessageContext, MessageTarget,
};
use tracing::{debug, warn};

pub struct MessageClassifier {
    identities: Identities,
    gateway: Arc<dyn ChatGateway>,
}

impl MessageClassifier {
    pub fn new(identities: Identities, gateway: Arc<dyn ChatGateway>) -> Self {
        Self {
            identities,
            gateway,
        }
    }

    pub fn identities(&self) -> &Identities {
        &self.identities
    }

    pub fn author_kind(&self, author_id: &str) -> AuthorKind {
        self.identities.kind_of(author_id)
    }

    pub async fn classify(&self, message: Message) -> ClassifiedMessage {
        let context = self.context_for(&message).await;
        ClassifiedMessage { message, context }
    }

    /// Derive the context for one message.
    pub async fn context_for(&self, message: &Message) -> MessageContext {
        let thread_owner = match &message.location {
            Location::Thread {
                owner_id: Some(owner),
                ..
            } => Some(self.author_kind(owner)),
            _ => None,
        };

        MessageContext {
            author_kind: self.author_kind(&message.author_id),
            location: message.location.clone(),
            reply_target: self.reply_target(message).await,
            thread_owner,
        }
    }

    async fn reply_target(&self, message: &Message) -> Option<MessageTarget> {
        let reference = message.reply_to.as_deref()?;
        match self.gateway.fetch_message(&message.location, reference).await {
            Ok(referenced) => {
                debug!(message_id = %message.id, reply_to = %reference, "Resolved reply target");
                Some(MessageTarget {
                    author_kind: self.author_kind(&referenced.author_id),
                    author_id: referenced.author_id,
                })
            }
            Err(e) => {
                warn!(
                    message_id = %message.id,
                    reply_to = %reference,
                    error = %e,
                    "Reply target unresolvable, treating as no reply"
                );
                None
            }
        }
    }
}
