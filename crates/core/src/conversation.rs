//! Conversation domain types: the platform-neutral request payload.
//!
//! A [`Conversation`] is built fresh for every request from gathered chat
//! context and handed to the answer orchestrator. It is never persisted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ImageError;
use crate::message::Attachment;

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A community member asking
    User,
    /// The bot or a team member answering
    Assistant,
}

/// A downloaded image, base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub base64_data: String,
    pub mime_type: String,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl ImagePayload {
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_data)
    }
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImagePayload>,
}

impl ConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
            author_id: None,
            images: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            ..Self::user(text)
        }
    }
}

/// An ordered, oldest-first list of role-tagged messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<ConversationMessage>,
}

impl Conversation {
    pub fn new(messages: Vec<ConversationMessage>) -> Self {
        Self { messages }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// The trailing run of user messages joined together: what the asker
    /// most recently said.
    pub fn latest_user_text(&self) -> String {
        let trailing: Vec<&str> = self
            .messages
            .iter()
            .rev()
            .skip_while(|m| m.role != Role::User)
            .take_while(|m| m.role == Role::User)
            .map(|m| m.text.as_str())
            .collect();
        trailing.into_iter().rev().collect::<Vec<_>>().join("\n")
    }

    pub fn has_images(&self) -> bool {
        self.messages.iter().any(|m| !m.images.is_empty())
    }

    /// Render as a plain transcript (`user: ...` lines) for prompts.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                format!("{role}: {}", m.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Identifies the chat location a request originated from. Used for logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub message_id: String,
}

/// Downloads image attachments for the conversation assembler.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, attachment: &Attachment) -> Result<ImagePayload, ImageError>;
}
