//! In-process chat gateway.
//!
//! Holds message history in memory and records everything the pipeline
//! writes. Used by the `run` command (events read from stdin) and by tests,
//! which can also make individual lookups fail.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use steward_core::error::GatewayError;
use steward_core::gateway::{ChatGateway, Direction};
use steward_core::message::{Location, Message};
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::info;

/// A thread opened by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedThread {
    pub thread_id: String,
    pub parent_id: String,
    pub source_message_id: String,
    pub name: String,
}

/// A reply posted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostedReply {
    pub thread_id: String,
    pub text: String,
}

/// Chat gateway backed by process memory.
pub struct InMemoryGateway {
    bot_user_id: String,
    history: RwLock<Vec<Message>>,
    inject_tx: Mutex<Option<mpsc::Sender<Message>>>,
    threads: Mutex<HashMap<String, CreatedThread>>,
    posts: Mutex<Vec<PostedReply>>,
    failing_fetches: Mutex<HashSet<String>>,
    fail_adjacent: AtomicBool,
    failing_posts: AtomicU32,
    next_id: AtomicU64,
}

impl InMemoryGateway {
    pub fn new(bot_user_id: impl Into<String>) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            history: RwLock::new(Vec::new()),
            inject_tx: Mutex::new(None),
            threads: Mutex::new(HashMap::new()),
            posts: Mutex::new(Vec::new()),
            failing_fetches: Mutex::new(HashSet::new()),
            fail_adjacent: AtomicBool::new(false),
            failing_posts: AtomicU32::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed history without emitting an arrival event.
    pub async fn insert(&self, message: Message) {
        self.history.write().await.push(message);
    }

    /// Record a message and deliver it as if it arrived from the platform.
    pub async fn inject(&self, message: Message) -> Result<(), GatewayError> {
        self.insert(message.clone()).await;
        let guard = self.inject_tx.lock().await;
        match guard.as_ref() {
            Some(tx) => tx
                .send(message)
                .await
                .map_err(|_| GatewayError::ConnectionLost("Event channel closed".into())),
            None => Err(GatewayError::ConnectionLost("Gateway not started".into())),
        }
    }

    /// Make every `fetch_message` for this ID fail.
    pub async fn fail_fetch(&self, message_id: impl Into<String>) {
        self.failing_fetches.lock().await.insert(message_id.into());
    }

    /// Make `fetch_adjacent` fail.
    pub fn fail_adjacent(&self, fail: bool) {
        self.fail_adjacent.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` thread creations or posts with a transient error.
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_posts.store(count, Ordering::SeqCst);
    }

    pub async fn posts(&self) -> Vec<PostedReply> {
        self.posts.lock().await.clone()
    }

    pub async fn threads(&self) -> Vec<CreatedThread> {
        self.threads.lock().await.values().cloned().collect()
    }

    fn take_write_failure(&self) -> bool {
        self.failing_posts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Messages sharing a location key, oldest first.
    async fn timeline(&self, key: &str) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .history
            .read()
            .await
            .iter()
            .filter(|m| m.location.key() == key)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        messages
    }
}

#[async_trait]
impl ChatGateway for InMemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    async fn start(&self) -> Result<mpsc::Receiver<Message>, GatewayError> {
        info!("In-memory gateway starting");
        let (tx, rx) = mpsc::channel(256);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn fetch_message(
        &self,
        _location: &Location,
        message_id: &str,
    ) -> Result<Message, GatewayError> {
        if self.failing_fetches.lock().await.contains(message_id) {
            return Err(GatewayError::RequestFailed(format!(
                "fetch of {message_id} failed"
            )));
        }
        self.history
            .read()
            .await
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(message_id.to_string()))
    }

    async fn fetch_adjacent(
        &self,
        location: &Location,
        anchor_id: &str,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<Message>, GatewayError> {
        if self.fail_adjacent.load(Ordering::SeqCst) {
            return Err(GatewayError::RequestFailed("history unavailable".into()));
        }
        let timeline = self.timeline(location.key()).await;
        let index = timeline
            .iter()
            .position(|m| m.id == anchor_id)
            .ok_or_else(|| GatewayError::NotFound(anchor_id.to_string()))?;

        Ok(match direction {
            Direction::Before => timeline[..index].iter().rev().take(limit).cloned().collect(),
            Direction::After => timeline[index + 1..].iter().take(limit).cloned().collect(),
        })
    }

    async fn fetch_thread_history(&self, thread_id: &str) -> Result<Vec<Message>, GatewayError> {
        Ok(self.timeline(thread_id).await)
    }

    async fn create_thread_from(
        &self,
        message: &Message,
        name: &str,
    ) -> Result<String, GatewayError> {
        if self.take_write_failure() {
            return Err(GatewayError::Timeout("thread creation timed out".into()));
        }
        let thread = CreatedThread {
            thread_id: self.next_id("thread"),
            parent_id: message.location.channel_id().to_string(),
            source_message_id: message.id.clone(),
            name: name.to_string(),
        };
        info!(thread_id = %thread.thread_id, name = %thread.name, "Thread created");
        let thread_id = thread.thread_id.clone();
        self.threads.lock().await.insert(thread_id.clone(), thread);
        Ok(thread_id)
    }

    async fn post(&self, thread_id: &str, text: &str) -> Result<(), GatewayError> {
        if self.take_write_failure() {
            return Err(GatewayError::Timeout("post timed out".into()));
        }
        let parent_id = self
            .threads
            .lock()
            .await
            .get(thread_id)
            .map(|t| t.parent_id.clone())
            .unwrap_or_default();

        let posted = Message::new(
            self.next_id("reply"),
            self.bot_user_id.clone(),
            text,
            Location::thread(thread_id, parent_id, Some(self.bot_user_id.clone())),
            Utc::now(),
        );
        self.history.write().await.push(posted);
        self.posts.lock().await.push(PostedReply {
            thread_id: thread_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), GatewayError> {
        info!("In-memory gateway stopping");
        *self.inject_tx.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn msg(id: &str, secs: i64) -> Message {
        Message::new(id, "u1", id, Location::channel("general"), at(secs))
    }

    #[tokio::test]
    async fn start_inject_and_receive() {
        let gw = InMemoryGateway::new("bot");
        let mut rx = gw.start().await.unwrap();
        gw.inject(msg("m1", 0)).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, "m1");
        assert!(gw.fetch_message(&received.location, "m1").await.is_ok());
    }

    #[tokio::test]
    async fn inject_before_start_fails() {
        let gw = InMemoryGateway::new("bot");
        assert!(gw.inject(msg("m1", 0)).await.is_err());
    }

    #[tokio::test]
    async fn adjacent_is_closest_first() {
        let gw = InMemoryGateway::new("bot");
        for (id, t) in [("a", 0), ("b", 1), ("c", 2), ("d", 3)] {
            gw.insert(msg(id, t)).await;
        }
        let loc = Location::channel("general");

        let before = gw.fetch_adjacent(&loc, "c", Direction::Before, 10).await.unwrap();
        let ids: Vec<_> = before.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let after = gw.fetch_adjacent(&loc, "b", Direction::After, 1).await.unwrap();
        assert_eq!(after[0].id, "c");
        assert_eq!(after.len(), 1);
    }

    #[tokio::test]
    async fn failure_knobs() {
        let gw = InMemoryGateway::new("bot");
        gw.insert(msg("a", 0)).await;
        gw.fail_fetch("a").await;
        let loc = Location::channel("general");
        assert!(gw.fetch_message(&loc, "a").await.is_err());

        gw.fail_adjacent(true);
        assert!(gw.fetch_adjacent(&loc, "a", Direction::After, 5).await.is_err());

        gw.fail_next_writes(1);
        assert!(gw.post("t", "hi").await.is_err());
        assert!(gw.post("t", "hi").await.is_ok());
    }

    #[tokio::test]
    async fn posts_appear_in_thread_history() {
        let gw = InMemoryGateway::new("bot");
        let source = msg("q", 0);
        gw.insert(source.clone()).await;
        let thread_id = gw.create_thread_from(&source, "FAQ: q").await.unwrap();
        gw.post(&thread_id, "answer").await.unwrap();

        let history = gw.fetch_thread_history(&thread_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].author_id, "bot");
        assert_eq!(gw.threads().await[0].parent_id, "general");
        assert_eq!(gw.posts().await[0].text, "answer");
    }
}
