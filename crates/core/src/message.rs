//! Message domain types.
//!
//! These are the value objects that flow through the pipeline:
//! gateway event → [`Message`] → classified into [`MessageContext`] →
//! batched and expanded into [`MessageGroup`]s → gathered into a
//! [`GatheredContext`] for the handlers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a message was posted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// A top-level channel.
    Channel { channel_id: String },
    /// A thread hanging off a channel.
    Thread {
        thread_id: String,
        parent_id: String,
        /// Author who started the thread, when the platform reports it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner_id: Option<String>,
    },
}

impl Location {
    pub fn channel(channel_id: impl Into<String>) -> Self {
        Self::Channel {
            channel_id: channel_id.into(),
        }
    }

    pub fn thread(
        thread_id: impl Into<String>,
        parent_id: impl Into<String>,
        owner_id: Option<String>,
    ) -> Self {
        Self::Thread {
            thread_id: thread_id.into(),
            parent_id: parent_id.into(),
            owner_id,
        }
    }

    /// The identifier messages are scoped to: the thread for threads,
    /// the channel otherwise.
    pub fn key(&self) -> &str {
        match self {
            Self::Channel { channel_id } => channel_id,
            Self::Thread { thread_id, .. } => thread_id,
        }
    }

    /// The enclosing channel (the parent for threads).
    pub fn channel_id(&self) -> &str {
        match self {
            Self::Channel { channel_id } => channel_id,
            Self::Thread { parent_id, .. } => parent_id,
        }
    }

    pub fn thread_id(&self) -> Option<&str> {
        match self {
            Self::Channel { .. } => None,
            Self::Thread { thread_id, .. } => Some(thread_id),
        }
    }

    pub fn is_thread(&self) -> bool {
        matches!(self, Self::Thread { .. })
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel { channel_id } => write!(f, "channel:{channel_id}"),
            Self::Thread {
                thread_id,
                parent_id,
                ..
            } => write!(f, "thread:{parent_id}/{thread_id}"),
        }
    }
}

/// An attachment on a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// URL the attachment can be downloaded from
    pub url: String,

    /// Optional filename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// MIME type reported by the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// File size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl Attachment {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: None,
            mime_type: Some("image/png".into()),
            size_bytes: None,
        }
    }

    /// Whether this attachment is an image, judged by MIME type first and
    /// by file extension when the platform did not report one.
    pub fn is_image(&self) -> bool {
        if let Some(mime) = &self.mime_type {
            return mime.starts_with("image/");
        }
        let name = self.filename.as_deref().unwrap_or(&self.url).to_ascii_lowercase();
        [".png", ".jpg", ".jpeg", ".gif", ".webp"]
            .iter()
            .any(|ext| name.ends_with(ext))
    }
}

/// A chat message as observed from the gateway. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Platform message ID
    pub id: String,

    /// Platform author ID
    pub author_id: String,

    /// Raw text content
    #[serde(default)]
    pub text: String,

    /// ID of the message this one replies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    /// Creation time
    pub timestamp: DateTime<Utc>,

    pub location: Location,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        text: impl Into<String>,
        location: Location,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            text: text.into(),
            reply_to: None,
            attachments: Vec::new(),
            timestamp,
            location,
        }
    }

    pub fn replying_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn images(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| a.is_image())
    }

    pub fn has_images(&self) -> bool {
        self.images().next().is_some()
    }

    /// No usable text and no image. Blank messages never enter a batch.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && !self.has_images()
    }
}

/// Who wrote a message, relative to this deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    CommunityUser,
    TeamMember,
    Bot,
}

/// Static identity configuration used to classify authors.
#[derive(Debug, Clone, Default)]
pub struct Identities {
    pub bot_user_id: String,
    pub team_member_ids: HashSet<String>,
}

impl Identities {
    pub fn new(
        bot_user_id: impl Into<String>,
        team_member_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            team_member_ids: team_member_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind_of(&self, author_id: &str) -> AuthorKind {
        if author_id == self.bot_user_id {
            AuthorKind::Bot
        } else if self.team_member_ids.contains(author_id) {
            AuthorKind::TeamMember
        } else {
            AuthorKind::CommunityUser
        }
    }
}

/// The classified author of a referenced message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTarget {
    pub author_kind: AuthorKind,
    pub author_id: String,
}

/// Derived per-message classification. Computed once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    pub author_kind: AuthorKind,
    pub location: Location,
    /// `None` when there is no reply, or the reply could not be resolved.
    pub reply_target: Option<MessageTarget>,
    /// Kind of the author who opened the enclosing thread, if any.
    pub thread_owner: Option<AuthorKind>,
}

/// A message together with its classification.
#[derive(Debug, Clone)]
pub struct ClassifiedMessage {
    pub message: Message,
    pub context: MessageContext,
}

/// Consecutive messages from one author, contiguous in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageGroup {
    pub author_id: String,
    /// Oldest first. Never empty.
    pub messages: Vec<Message>,
}

impl MessageGroup {
    pub fn single(message: Message) -> Self {
        Self {
            author_id: message.author_id.clone(),
            messages: vec![message],
        }
    }

    pub fn first(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.id.as_str()).collect()
    }
}

/// Everything a handler gets to see about one finalized batch.
#[derive(Debug, Clone, Default)]
pub struct GatheredContext {
    /// The finalized batch that triggered handling, oldest first.
    pub batch: Vec<Message>,
    /// Full thread history when the batch was posted in a thread.
    pub thread_history: Option<Vec<Message>>,
    /// Reply-chain groups, oldest first.
    pub reply_chain: Vec<MessageGroup>,
    /// Direct reply target of the triggering message.
    pub reply_target: Option<MessageTarget>,
}

impl GatheredContext {
    /// The newest message of the batch, the one a reply is anchored to.
    pub fn anchor(&self) -> Option<&Message> {
        self.batch.last()
    }
}
