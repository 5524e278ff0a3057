//! Quiet-window batching.
//!
//! Consecutive messages from one author in one channel or thread are held
//! until the author has been quiet for the configured window, then handed
//! on as a single [`Batch`].
//!
//! Each live key is owned by one actor task with its own mailbox. The
//! shared map only routes arrivals to the right mailbox; it never holds
//! batch contents, so keys never contend with each other. An actor removes
//! its map entry before draining its mailbox, which means an arrival racing
//! with finalization either lands in the closing batch or opens the next one.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use steward_core::message::Message;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Scheduling key: one pending batch per author per channel or thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub author_id: String,
    pub location_key: String,
}

impl BatchKey {
    pub fn of(message: &Message) -> Self {
        Self {
            author_id: message.author_id.clone(),
            location_key: message.location.key().to_string(),
        }
    }
}

impl std::fmt::Display for BatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.author_id, self.location_key)
    }
}

/// A finalized burst, in arrival order. Never empty.
#[derive(Debug, Clone)]
pub struct Batch {
    pub key: BatchKey,
    pub messages: Vec<Message>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    /// Whitespace-only text and no image.
    Dropped,
}

type Arrival = (Instant, Message);
type Mailbox = mpsc::UnboundedSender<Arrival>;

pub struct BatchScheduler {
    quiet_window: Duration,
    pending: Arc<DashMap<BatchKey, Mailbox>>,
    output: mpsc::Sender<Batch>,
}

impl BatchScheduler {
    pub fn new(quiet_window: Duration, output: mpsc::Sender<Batch>) -> Self {
        Self {
            quiet_window,
            pending: Arc::new(DashMap::new()),
            output,
        }
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet_window
    }

    /// Number of keys with a batch still open.
    pub fn pending_keys(&self) -> usize {
        self.pending.len()
    }

    /// Add a message to its author's pending batch, opening one if needed.
    pub fn submit(&self, message: Message) -> SubmitOutcome {
        if message.is_blank() {
            debug!(message_id = %message.id, "Dropping blank message");
            return SubmitOutcome::Dropped;
        }

        let key = BatchKey::of(&message);
        let arrival = (Instant::now(), message);

        // The entry guard is held across the send so finalization (which
        // needs the same shard lock to remove the key) cannot interleave.
        match self.pending.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if let Err(mpsc::error::SendError(arrival)) = entry.get().send(arrival) {
                    warn!(key = %key, "Batch actor gone, opening a new batch");
                    entry.insert(self.spawn_actor(key, arrival));
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(self.spawn_actor(key, arrival));
            }
        }
        SubmitOutcome::Queued
    }

    fn spawn_actor(&self, key: BatchKey, first: Arrival) -> Mailbox {
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(key = %key, "Opening batch");
        tokio::spawn(run_batch(
            key,
            first,
            self.quiet_window,
            rx,
            tx.clone(),
            self.pending.clone(),
            self.output.clone(),
        ));
        tx
    }
}

/// Own one key until its quiet window elapses, then emit the batch.
async fn run_batch(
    key: BatchKey,
    (arrived, first): Arrival,
    quiet_window: Duration,
    mut mailbox: mpsc::UnboundedReceiver<Arrival>,
    own_sender: Mailbox,
    pending: Arc<DashMap<BatchKey, Mailbox>>,
    output: mpsc::Sender<Batch>,
) {
    let mut messages = vec![first];
    let deadline = tokio::time::sleep_until(arrived + quiet_window);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            Some((arrived, message)) = mailbox.recv() => {
                messages.push(message);
                deadline.as_mut().reset(arrived + quiet_window);
            }
            () = &mut deadline => break,
        }
    }

    pending.remove_if(&key, |_, tx| tx.same_channel(&own_sender));
    drop(own_sender);
    while let Ok((_, message)) = mailbox.try_recv() {
        messages.push(message);
    }

    info!(key = %key, count = messages.len(), "Batch finalized");
    if output.send(Batch { key, messages }).await.is_err() {
        warn!("Batch consumer closed, dropping batch");
    }
}
