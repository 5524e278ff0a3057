//! # Steward Core
//!
//! Domain types, collaborator traits, and error definitions for the Steward
//! conversation pipeline. This crate has **no runtime behavior of its own**:
//! it defines the model that the classifier, scheduler, resolver and answer
//! orchestrator are written against.
//!
//! ## Collaborators
//!
//! Everything the pipeline talks to is a trait here:
//! - [`ChatGateway`]: message delivery, history lookups, thread posting
//! - [`KnowledgeSource`]: index text and full source content
//! - [`AnswerModel`]: the four language-model capabilities
//! - [`ImageFetcher`]: attachment download
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted stand-ins without touching pipeline code.

pub mod answer;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod knowledge;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use answer::{AIResult, Draft, GateDecision, LoadedSource, SelectionResult, VerificationResult};
pub use conversation::{Conversation, ConversationMessage, ImageFetcher, ImagePayload, RequestContext, Role};
pub use error::{GatewayError, ImageError, KnowledgeError, ProviderError};
pub use gateway::{ChatGateway, Direction};
pub use knowledge::KnowledgeSource;
pub use message::{
    Attachment, AuthorKind, ClassifiedMessage, GatheredContext, Identities, Location, Message,
    MessageContext, MessageGroup, MessageTarget,
};
pub use provider::AnswerModel;
