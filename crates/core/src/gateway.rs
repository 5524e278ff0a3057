//! ChatGateway trait: the abstraction over the chat platform.
//!
//! A gateway delivers message-arrival events and answers the handful of
//! lookups the pipeline needs (single messages, neighbouring history,
//! thread history). It also creates threads and posts replies. Every
//! failure comes back as a [`GatewayError`] value.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::message::{Location, Message};

/// Which side of an anchor message to read history from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Older messages, returned newest first (closest to the anchor first).
    Before,
    /// Newer messages, returned oldest first (closest to the anchor first).
    After,
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Human-readable platform name (e.g., "discord", "memory").
    fn name(&self) -> &str;

    /// Start receiving message-arrival events.
    async fn start(&self) -> Result<mpsc::Receiver<Message>, GatewayError>;

    /// Fetch a single message by ID within a location.
    async fn fetch_message(&self, location: &Location, message_id: &str)
    -> Result<Message, GatewayError>;

    /// Fetch up to `limit` messages adjacent to `anchor_id`, excluding the
    /// anchor itself, ordered closest-to-anchor first.
    async fn fetch_adjacent(
        &self,
        location: &Location,
        anchor_id: &str,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<Message>, GatewayError>;

    /// Full thread history, oldest first.
    async fn fetch_thread_history(&self, thread_id: &str) -> Result<Vec<Message>, GatewayError>;

    /// Open a thread from a message; returns the new thread ID.
    async fn create_thread_from(&self, message: &Message, name: &str) -> Result<String, GatewayError>;

    /// Post text into a thread.
    async fn post(&self, thread_id: &str, text: &str) -> Result<(), GatewayError>;

    /// Stop the gateway gracefully.
    async fn stop(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
