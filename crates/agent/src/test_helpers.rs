//! Shared test helpers: scripted collaborators and message builders.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use steward_core::answer::{Draft, GateDecision, LoadedSource, VerificationResult};
use steward_core::conversation::{Conversation, ConversationMessage, ImageFetcher, ImagePayload};
use steward_core::error::{ImageError, KnowledgeError, ProviderError};
use steward_core::knowledge::KnowledgeSource;
use steward_core::message::{Attachment, Location, Message};
use steward_core::provider::AnswerModel;

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

pub fn msg(id: &str, author: &str, text: &str, secs: i64) -> Message {
    Message::new(id, author, text, Location::channel("help"), at(secs))
}

pub fn user_conversation(text: &str) -> Conversation {
    Conversation::new(vec![ConversationMessage::user(text)])
}

pub fn answerable(rewrite_query: Option<&str>) -> GateDecision {
    GateDecision {
        is_question: true,
        is_answerable: true,
        rewrite_query: rewrite_query.map(String::from),
        reason: String::new(),
    }
}

/// An answer model that replays scripted responses per capability.
///
/// An exhausted script answers with `NotConfigured`, which is not retried.
#[derive(Default)]
pub struct ScriptedModel {
    gates: Mutex<VecDeque<Result<GateDecision, ProviderError>>>,
    selections: Mutex<VecDeque<Result<Vec<String>, ProviderError>>>,
    drafts: Mutex<VecDeque<Result<Draft, ProviderError>>>,
    verdicts: Mutex<VecDeque<Result<VerificationResult, ProviderError>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    queries: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(self, decision: GateDecision) -> Self {
        self.gates.lock().unwrap().push_back(Ok(decision));
        self
    }

    pub fn gate_error(self, error: ProviderError) -> Self {
        self.gates.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn select(self, ids: Vec<&str>) -> Self {
        self.selections
            .lock()
            .unwrap()
            .push_back(Ok(ids.into_iter().map(String::from).collect()));
        self
    }

    pub fn generate(self, text: &str, citations: Vec<&str>) -> Self {
        self.drafts.lock().unwrap().push_back(Ok(Draft {
            text: text.into(),
            citations: citations.into_iter().map(String::from).collect(),
        }));
        self
    }

    pub fn verify(self, verdict: VerificationResult) -> Self {
        self.verdicts.lock().unwrap().push_back(Ok(verdict));
        self
    }

    /// Sleep this long before every response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self, capability: &str) -> usize {
        self.calls.lock().unwrap().get(capability).copied().unwrap_or(0)
    }

    pub fn select_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    async fn next<T>(
        &self,
        capability: &'static str,
        queue: &Mutex<VecDeque<Result<T, ProviderError>>>,
    ) -> Result<T, ProviderError> {
        *self.calls.lock().unwrap().entry(capability).or_default() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = queue.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Err(ProviderError::NotConfigured(format!(
                "no scripted {capability} response"
            )))
        })
    }
}

#[async_trait::async_trait]
impl AnswerModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn gate(&self, _: &Conversation, _: &str) -> Result<GateDecision, ProviderError> {
        self.next("gate", &self.gates).await
    }

    async fn select(&self, query: &str, _: &str, _: &str) -> Result<Vec<String>, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.next("select", &self.selections).await
    }

    async fn generate(
        &self,
        _: &Conversation,
        _: &[LoadedSource],
        _: &str,
    ) -> Result<Draft, ProviderError> {
        self.next("generate", &self.drafts).await
    }

    async fn verify(
        &self,
        _: &str,
        _: &[LoadedSource],
        _: &str,
    ) -> Result<VerificationResult, ProviderError> {
        self.next("verify", &self.verdicts).await
    }
}

/// Knowledge held in memory, with optional per-source failures.
pub struct StaticKnowledge {
    index: String,
    sources: HashMap<String, String>,
    failures: HashMap<String, KnowledgeError>,
    loads: Mutex<usize>,
}

impl StaticKnowledge {
    pub fn new(index: &str) -> Self {
        Self {
            index: index.into(),
            sources: HashMap::new(),
            failures: HashMap::new(),
            loads: Mutex::new(0),
        }
    }

    pub fn with_source(mut self, id: &str, text: &str) -> Self {
        self.sources.insert(id.into(), text.into());
        self
    }

    pub fn with_failure(mut self, id: &str, error: KnowledgeError) -> Self {
        self.failures.insert(id.into(), error);
        self
    }

    pub fn loads(&self) -> usize {
        *self.loads.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl KnowledgeSource for StaticKnowledge {
    async fn get_index_text(&self) -> Result<String, KnowledgeError> {
        Ok(self.index.clone())
    }

    async fn load_source(&self, source_id: &str) -> Result<Option<String>, KnowledgeError> {
        *self.loads.lock().unwrap() += 1;
        if let Some(error) = self.failures.get(source_id) {
            return Err(error.clone());
        }
        Ok(self.sources.get(source_id).cloned())
    }
}

/// Image fetcher that succeeds only for known URLs and counts calls.
pub struct StaticImages {
    known: HashSet<String>,
    calls: Mutex<usize>,
}

impl StaticImages {
    pub fn new<'a>(known: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            known: known.into_iter().map(String::from).collect(),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ImageFetcher for StaticImages {
    async fn fetch(&self, attachment: &Attachment) -> Result<ImagePayload, ImageError> {
        *self.calls.lock().unwrap() += 1;
        if !self.known.contains(&attachment.url) {
            return Err(ImageError::Status {
                url: attachment.url.clone(),
                status: 404,
            });
        }
        Ok(ImagePayload {
            base64_data: "aW1n".into(),
            mime_type: "image/png".into(),
            source_url: attachment.url.clone(),
            filename: None,
        })
    }
}
