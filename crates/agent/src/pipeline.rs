//! Event intake and handler dispatch.
//!
//! gateway event → batch (quiet window) → classify → route → resolve reply
//! chain → answer or capture. Intake only hands messages to the scheduler,
//! so a slow lookup for one author never delays another. Each finalized
//! batch is handled on its own task; nothing is shared between batches
//! except immutable wiring.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use steward_channels::{
    Batch, BatchScheduler, Handler, MessageClassifier, ReplyChainResolver, ResolverLimits,
    RouteInput, route,
};
use steward_config::AppConfig;
use steward_core::conversation::RequestContext;
use steward_core::error::{GatewayError, ImageError};
use steward_core::gateway::ChatGateway;
use steward_core::knowledge::KnowledgeSource;
use steward_core::message::{ClassifiedMessage, GatheredContext, Message};
use steward_core::provider::AnswerModel;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::capture::{CaptureSink, LogCaptureSink};
use crate::context::{ConversationAssembler, HttpImageFetcher};
use crate::orchestrator::AnswerOrchestrator;
use crate::retry::RetryPolicy;

/// Runtime switches for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub bot_user_id: String,
    pub quiet_window: Duration,
    /// Log replies instead of posting them.
    pub dry_run: bool,
    /// Policy for thread creation and posting.
    pub write_retry: RetryPolicy,
}

/// What happened to one handler invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandleOutcome {
    Ignored,
    /// The orchestrator (or assembly) chose silence.
    Silent { handler: Handler },
    Posted { handler: Handler, thread_id: String },
    DryRun { handler: Handler, text: String },
    Captured,
    /// A gateway write failed after retries. Nothing was posted.
    Failed { handler: Handler, error: String },
}

pub struct Pipeline {
    gateway: Arc<dyn ChatGateway>,
    classifier: MessageClassifier,
    resolver: ReplyChainResolver,
    assembler: ConversationAssembler,
    orchestrator: AnswerOrchestrator,
    capture: Arc<dyn CaptureSink>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        classifier: MessageClassifier,
        resolver: ReplyChainResolver,
        assembler: ConversationAssembler,
        orchestrator: AnswerOrchestrator,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            gateway,
            classifier,
            resolver,
            assembler,
            orchestrator,
            capture: Arc::new(LogCaptureSink),
            settings,
        }
    }

    /// Wire the full pipeline from configuration.
    pub fn from_config(
        gateway: Arc<dyn ChatGateway>,
        model: Arc<dyn AnswerModel>,
        knowledge: Arc<dyn KnowledgeSource>,
        config: &AppConfig,
    ) -> Result<Self, ImageError> {
        let identities = config.identities();
        let classifier = MessageClassifier::new(identities.clone(), gateway.clone());
        let resolver = ReplyChainResolver::new(
            gateway.clone(),
            ResolverLimits {
                max_depth: config.resolver.max_depth,
                scan_limit: config.resolver.scan_limit,
                group_gap: config.group_gap(),
            },
        );

        let mut assembler = ConversationAssembler::new(identities);
        if config.images.enabled {
            assembler = assembler.with_images(Arc::new(HttpImageFetcher::from_config(&config.images)?));
        }

        let settings = PipelineSettings {
            bot_user_id: config.identity.bot_user_id.clone(),
            quiet_window: config.batching.quiet_window(),
            dry_run: config.app.dry_run,
            write_retry: RetryPolicy::new(
                config.gateway.post_attempts,
                Duration::from_millis(config.gateway.post_base_delay_ms),
            ),
        };

        Ok(Self::new(
            gateway,
            classifier,
            resolver,
            assembler,
            AnswerOrchestrator::from_config(model, knowledge, config),
            settings,
        ))
    }

    pub fn with_capture(mut self, sink: Arc<dyn CaptureSink>) -> Self {
        self.capture = sink;
        self
    }

    pub fn orchestrator(&self) -> &AnswerOrchestrator {
        &self.orchestrator
    }

    /// Start the gateway and process events until its stream closes.
    ///
    /// The returned task finishes after every pending batch has been
    /// finalized and handled.
    pub async fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, GatewayError> {
        let events = self.gateway.start().await?;
        info!(gateway = self.gateway.name(), dry_run = self.settings.dry_run, "Pipeline started");
        Ok(tokio::spawn(self.clone().run(events)))
    }

    async fn run(self: Arc<Self>, mut events: mpsc::Receiver<Message>) {
        let (batch_tx, mut batch_rx) = mpsc::channel::<Batch>(64);
        let scheduler = BatchScheduler::new(self.settings.quiet_window, batch_tx);

        let dispatcher = {
            let this = self.clone();
            tokio::spawn(async move {
                let mut handlers = JoinSet::new();
                while let Some(batch) = batch_rx.recv().await {
                    reap_finished(&mut handlers);
                    let this = this.clone();
                    let span = info_span!(
                        "batch",
                        request_id = %uuid::Uuid::new_v4(),
                        key = %batch.key,
                    );
                    handlers.spawn(
                        async move {
                            this.handle_batch(batch).await;
                        }
                        .instrument(span),
                    );
                }
                while let Some(joined) = handlers.join_next().await {
                    if let Err(e) = joined {
                        warn!(error = %e, "Batch handler panicked");
                    }
                }
            })
        };

        while let Some(message) = events.recv().await {
            debug!(message_id = %message.id, author = %message.author_id, "Event received");
            scheduler.submit(message);
        }

        info!("Event stream closed, flushing pending batches");
        drop(scheduler);
        if let Err(e) = dispatcher.await {
            warn!(error = %e, "Dispatcher task failed");
        }
    }

    /// Classify and route every message of one finalized batch, then run
    /// each handler on the messages routed to it.
    pub async fn handle_batch(&self, batch: Batch) -> Vec<HandleOutcome> {
        let key = batch.key;
        let classified = join_all(
            batch
                .messages
                .into_iter()
                .map(|message| self.classifier.classify(message)),
        )
        .await;

        // A batch never spans locations, so one history lookup serves all.
        let thread_history = match classified.first().and_then(|c| c.message.location.thread_id()) {
            Some(thread_id) => match self.gateway.fetch_thread_history(thread_id).await {
                Ok(history) => Some(history),
                Err(e) => {
                    warn!(thread_id, error = %e, "Thread history unavailable");
                    None
                }
            },
            None => None,
        };
        let has_bot_activity = thread_history
            .as_ref()
            .is_some_and(|h| h.iter().any(|m| m.author_id == self.settings.bot_user_id));

        let lanes = route_messages(classified, has_bot_activity);
        if lanes.is_empty() {
            debug!(key = %key, "No handler for batch");
            return vec![HandleOutcome::Ignored];
        }

        let mut outcomes = Vec::with_capacity(lanes.len());
        for (handler, messages) in lanes {
            let gathered = self.gather(&messages, thread_history.clone()).await;
            let outcome = match handler {
                Handler::AnswerChannel | Handler::AnswerThread => {
                    self.answer(handler, &gathered).await
                }
                Handler::CaptureQa => {
                    self.capture.capture(&gathered).await;
                    HandleOutcome::Captured
                }
            };
            info!(?outcome, "Handler finished");
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Resolve the reply chain for the messages routed to one handler.
    ///
    /// The message carrying a reply reference anchors the chain; without
    /// one, the newest message does.
    async fn gather(
        &self,
        messages: &[ClassifiedMessage],
        thread_history: Option<Vec<Message>>,
    ) -> GatheredContext {
        let trigger = messages
            .iter()
            .find(|c| c.message.reply_to.is_some())
            .or_else(|| messages.last());

        let (reply_chain, reply_target) = match trigger {
            Some(trigger) => (
                self.resolver.resolve(&trigger.message).await.groups,
                trigger.context.reply_target.clone(),
            ),
            None => (Vec::new(), None),
        };

        GatheredContext {
            batch: messages.iter().map(|c| c.message.clone()).collect(),
            thread_history,
            reply_chain,
            reply_target,
        }
    }

    async fn answer(&self, handler: Handler, gathered: &GatheredContext) -> HandleOutcome {
        let Some(anchor) = gathered.anchor() else {
            return HandleOutcome::Ignored;
        };
        let request = RequestContext {
            channel_id: anchor.location.channel_id().to_string(),
            thread_id: anchor.location.thread_id().map(String::from),
            message_id: anchor.id.clone(),
        };

        let conversation = match self.assembler.assemble(gathered).await {
            Ok(conversation) => conversation,
            Err(e) => {
                warn!(message_id = %anchor.id, error = %e, "Conversation assembly aborted");
                return HandleOutcome::Silent { handler };
            }
        };

        let result = self.orchestrator.generate_reply(&conversation, &request).await;
        let Some(text) = result.publishable_text() else {
            debug!(debug = ?result.debug, "Staying silent");
            return HandleOutcome::Silent { handler };
        };

        if self.settings.dry_run {
            info!(message_id = %anchor.id, reply = %text, "Dry run, not posting");
            return HandleOutcome::DryRun {
                handler,
                text: text.to_string(),
            };
        }

        let thread_id = match (handler, request.thread_id) {
            (Handler::AnswerThread, Some(thread_id)) => thread_id,
            _ => {
                let name = thread_name(&anchor.text);
                match self
                    .settings
                    .write_retry
                    .run("create_thread", || self.gateway.create_thread_from(anchor, &name))
                    .await
                {
                    Ok(thread_id) => thread_id,
                    Err(e) => {
                        return HandleOutcome::Failed {
                            handler,
                            error: e.to_string(),
                        };
                    }
                }
            }
        };

        match self
            .settings
            .write_retry
            .run("post", || self.gateway.post(&thread_id, text))
            .await
        {
            Ok(()) => HandleOutcome::Posted { handler, thread_id },
            Err(e) => HandleOutcome::Failed {
                handler,
                error: e.to_string(),
            },
        }
    }
}

/// Route each message on its own context and group the routed ones by
/// handler, keeping arrival order. Ignored messages are dropped here.
fn route_messages(
    messages: Vec<ClassifiedMessage>,
    thread_has_bot_activity: bool,
) -> Vec<(Handler, Vec<ClassifiedMessage>)> {
    let mut lanes: Vec<(Handler, Vec<ClassifiedMessage>)> = Vec::new();
    for message in messages {
        let input = RouteInput::from_context(
            &message.message.author_id,
            &message.context,
            thread_has_bot_activity,
        );
        let decision = route(&input);
        if decision.is_ignored() {
            debug!(message_id = %message.message.id, ?input, "Message routed nowhere");
            continue;
        }
        for handler in decision.handlers {
            match lanes.iter_mut().find(|(h, _)| *h == handler) {
                Some((_, lane)) => lane.push(message.clone()),
                None => lanes.push((handler, vec![message.clone()])),
            }
        }
    }
    lanes
}

/// Drop handler tasks that already finished, reporting panics.
fn reap_finished(handlers: &mut JoinSet<()>) {
    while let Some(joined) = handlers.try_join_next() {
        if let Err(e) = joined {
            warn!(error = %e, "Batch handler panicked");
        }
    }
}

/// Thread title for a channel answer: the question's first 80 characters.
pub fn thread_name(text: &str) -> String {
    let base = text.trim().replace('\n', " ");
    if base.is_empty() {
        return "FAQ Answer".into();
    }
    let base: String = base.chars().take(80).collect();
    format!("FAQ: {base}")
}
