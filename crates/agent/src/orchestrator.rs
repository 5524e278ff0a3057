//! The grounded-answer workflow.
//!
//! ```text
//! GATE → SELECT → LOAD → GENERATE → [VERIFY] → reply
//!   │       │       │        │           │
//!   └───────┴───────┴────────┴───────────┴──→ silent
//! ```
//!
//! Each stage is a typed async step that either hands its output to the
//! next stage or halts. Every halt, error and the end-to-end timeout
//! resolve to a silent [`AIResult`]; callers never see an error. The
//! orchestrator holds only immutable wiring, so one instance serves any
//! number of concurrent requests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Map, Value, json};
use steward_config::{AnswerConfig, AppConfig};
use steward_core::answer::{AIResult, Draft, LoadedSource, SelectionResult, is_url};
use steward_core::conversation::{Conversation, RequestContext};
use steward_core::knowledge::KnowledgeSource;
use steward_core::provider::AnswerModel;
use steward_providers::PromptSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

/// Answer policy knobs.
#[derive(Debug, Clone)]
pub struct AnswerPolicy {
    pub graph_timeout: Duration,
    pub enable_verification: bool,
    pub require_citations: bool,
    pub max_sources: usize,
    pub max_answer_chars: usize,
}

impl Default for AnswerPolicy {
    fn default() -> Self {
        Self::from_config(&AnswerConfig::default())
    }
}

impl AnswerPolicy {
    pub fn from_config(config: &AnswerConfig) -> Self {
        Self {
            graph_timeout: Duration::from_secs(config.graph_timeout_secs),
            enable_verification: config.enable_verification,
            require_citations: config.require_citations,
            max_sources: config.max_sources,
            max_answer_chars: config.max_answer_chars,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Gate,
    Select,
    Load,
    Generate,
    Verify,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gate => "gate",
            Self::Select => "select",
            Self::Load => "load",
            Self::Generate => "generate",
            Self::Verify => "verify",
        }
    }
}

/// Why a run ended without a reply.
#[derive(Debug, Clone, PartialEq)]
enum Halt {
    NotAnswerable { is_question: bool, reason: String },
    NoSelection,
    NothingLoaded { requested: usize },
    EmptyDraft,
    NoCitations,
    Rejected { issues: Vec<String> },
    Failed { stage: Stage, error: String },
}

impl Halt {
    fn stage(&self) -> Stage {
        match self {
            Self::NotAnswerable { .. } => Stage::Gate,
            Self::NoSelection => Stage::Select,
            Self::NothingLoaded { .. } => Stage::Load,
            Self::EmptyDraft | Self::NoCitations => Stage::Generate,
            Self::Rejected { .. } => Stage::Verify,
            Self::Failed { stage, .. } => *stage,
        }
    }

    fn into_debug(self) -> Map<String, Value> {
        let stage = self.stage().as_str();
        let detail = match self {
            Self::NotAnswerable {
                is_question,
                reason,
            } => json!({ "halt": "not_answerable", "is_question": is_question, "reason": reason }),
            Self::NoSelection => json!({ "halt": "no_selection" }),
            Self::NothingLoaded { requested } => {
                json!({ "halt": "nothing_loaded", "requested": requested })
            }
            Self::EmptyDraft => json!({ "halt": "empty_draft" }),
            Self::NoCitations => json!({ "halt": "no_citations" }),
            Self::Rejected { issues } => json!({ "halt": "rejected", "issues": issues }),
            Self::Failed { error, .. } => json!({ "halt": "error", "error": error }),
        };
        let mut debug = match detail {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        debug.insert("stage".into(), Value::String(stage.into()));
        debug
    }
}

pub struct AnswerOrchestrator {
    model: Arc<dyn AnswerModel>,
    knowledge: Arc<dyn KnowledgeSource>,
    prompts: PromptSet,
    policy: AnswerPolicy,
    llm_retry: RetryPolicy,
    load_retry: RetryPolicy,
}

impl AnswerOrchestrator {
    pub fn new(
        model: Arc<dyn AnswerModel>,
        knowledge: Arc<dyn KnowledgeSource>,
        prompts: PromptSet,
        policy: AnswerPolicy,
    ) -> Self {
        Self {
            model,
            knowledge,
            prompts,
            policy,
            llm_retry: RetryPolicy::default(),
            load_retry: RetryPolicy::default(),
        }
    }

    /// Wire everything from configuration.
    pub fn from_config(
        model: Arc<dyn AnswerModel>,
        knowledge: Arc<dyn KnowledgeSource>,
        config: &AppConfig,
    ) -> Self {
        let llm_retry = RetryPolicy::new(
            config.llm.max_retries.saturating_add(1),
            Duration::from_millis(config.llm.retry_base_delay_ms),
        )
        .with_call_timeout(Duration::from_secs(config.llm.timeout_secs))
        .with_jitter(Duration::from_millis(config.llm.retry_jitter_ms));

        let load_retry = RetryPolicy::new(
            config.llm.max_retries.saturating_add(1),
            Duration::from_millis(config.llm.retry_base_delay_ms),
        )
        .with_call_timeout(Duration::from_secs(config.knowledge.load_timeout_secs))
        .with_jitter(Duration::from_millis(config.llm.retry_jitter_ms));

        Self::new(
            model,
            knowledge,
            PromptSet::from_config(&config.answer),
            AnswerPolicy::from_config(&config.answer),
        )
        .with_llm_retry(llm_retry)
        .with_load_retry(load_retry)
    }

    pub fn with_llm_retry(mut self, retry: RetryPolicy) -> Self {
        self.llm_retry = retry;
        self
    }

    pub fn with_load_retry(mut self, retry: RetryPolicy) -> Self {
        self.load_retry = retry;
        self
    }

    pub fn policy(&self) -> &AnswerPolicy {
        &self.policy
    }

    /// Run the workflow for one conversation. Never fails; every problem
    /// becomes `should_reply = false`.
    pub async fn generate_reply(
        &self,
        conversation: &Conversation,
        request: &RequestContext,
    ) -> AIResult {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.policy.graph_timeout, self.run(conversation)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(mut result)) => {
                info!(
                    channel_id = %request.channel_id,
                    message_id = %request.message_id,
                    citations = result.citations.len(),
                    elapsed_ms,
                    "Answer ready"
                );
                result.debug.insert("elapsed_ms".into(), json!(elapsed_ms));
                result
            }
            Ok(Err(halt)) => {
                info!(
                    channel_id = %request.channel_id,
                    message_id = %request.message_id,
                    stage = halt.stage().as_str(),
                    elapsed_ms,
                    "Answer halted"
                );
                let mut debug = halt.into_debug();
                debug.insert("elapsed_ms".into(), json!(elapsed_ms));
                AIResult::silent(debug)
            }
            Err(_) => {
                warn!(
                    channel_id = %request.channel_id,
                    message_id = %request.message_id,
                    timeout_secs = self.policy.graph_timeout.as_secs(),
                    "Answer timed out"
                );
                let mut debug = Map::new();
                debug.insert("halt".into(), json!("timeout"));
                debug.insert("elapsed_ms".into(), json!(elapsed_ms));
                AIResult::silent(debug)
            }
        }
    }

    async fn run(&self, conversation: &Conversation) -> Result<AIResult, Halt> {
        let query = self.gate(conversation).await?;
        let selection = self.select(query).await?;
        let sources = self.load(&selection).await?;
        let draft = self.generate(conversation, &sources).await?;
        if self.policy.enable_verification {
            self.verify(&draft, &sources).await?;
        }

        let text = with_source_links(&draft.text, &draft.citations);
        let mut result = AIResult::reply(text, draft.citations);
        result.debug.insert("query".into(), json!(selection.query));
        result
            .debug
            .insert("loaded".into(), json!(sources.iter().map(|s| &s.source_id).collect::<Vec<_>>()));
        Ok(result)
    }

    /// Decide whether to try at all; returns the retrieval query.
    async fn gate(&self, conversation: &Conversation) -> Result<String, Halt> {
        if conversation.is_empty() {
            return Err(Halt::NotAnswerable {
                is_question: false,
                reason: "empty conversation".into(),
            });
        }

        let decision = self
            .llm_retry
            .run("gate", || self.model.gate(conversation, &self.prompts.gating))
            .await
            .map_err(|e| Halt::Failed {
                stage: Stage::Gate,
                error: e.to_string(),
            })?;
        debug!(?decision, "answer.gate");

        if !decision.is_question || !decision.is_answerable {
            return Err(Halt::NotAnswerable {
                is_question: decision.is_question,
                reason: decision.reason,
            });
        }

        Ok(decision
            .rewrite_query
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| conversation.latest_user_text()))
    }

    /// Choose up to `max_sources` identifiers from the index.
    async fn select(&self, query: String) -> Result<SelectionResult, Halt> {
        let index = self
            .load_retry
            .run("index", || self.knowledge.get_index_text())
            .await
            .map_err(|e| Halt::Failed {
                stage: Stage::Select,
                error: e.to_string(),
            })?;
        if index.trim().is_empty() {
            warn!("Knowledge index is empty");
            return Err(Halt::NoSelection);
        }

        let picked = self
            .llm_retry
            .run("select", || {
                self.model.select(&query, &index, &self.prompts.selection)
            })
            .await
            .map_err(|e| Halt::Failed {
                stage: Stage::Select,
                error: e.to_string(),
            })?;

        let mut seen = HashSet::new();
        let source_ids: Vec<String> = picked
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .take(self.policy.max_sources)
            .collect();
        debug!(query = %query, ?source_ids, "answer.select");

        if source_ids.is_empty() {
            return Err(Halt::NoSelection);
        }
        Ok(SelectionResult { query, source_ids })
    }

    /// Load every selected source concurrently, keeping whatever succeeds.
    async fn load(&self, selection: &SelectionResult) -> Result<Vec<LoadedSource>, Halt> {
        let loads = selection.source_ids.iter().map(|id| async move {
            let result = self
                .load_retry
                .run("load_source", || self.knowledge.load_source(id))
                .await;
            (id, result)
        });

        let mut sources = Vec::new();
        for (id, result) in join_all(loads).await {
            match result {
                Ok(Some(text)) if !text.trim().is_empty() => sources.push(LoadedSource {
                    source_id: id.clone(),
                    text,
                }),
                Ok(Some(_)) => warn!(source_id = %id, "Source is empty, skipping"),
                Ok(None) => warn!(source_id = %id, "Source not found, skipping"),
                Err(e) => warn!(source_id = %id, error = %e, "Source failed to load, skipping"),
            }
        }
        debug!(requested = selection.source_ids.len(), loaded = sources.len(), "answer.load");

        if sources.is_empty() {
            return Err(Halt::NothingLoaded {
                requested: selection.source_ids.len(),
            });
        }
        Ok(sources)
    }

    /// Draft the answer; citations are narrowed to what was loaded.
    async fn generate(
        &self,
        conversation: &Conversation,
        sources: &[LoadedSource],
    ) -> Result<Draft, Halt> {
        let draft = self
            .llm_retry
            .run("generate", || {
                self.model.generate(conversation, sources, &self.prompts.answer)
            })
            .await
            .map_err(|e| Halt::Failed {
                stage: Stage::Generate,
                error: e.to_string(),
            })?;

        let text = truncate_chars(draft.text.trim(), self.policy.max_answer_chars);
        if text.is_empty() {
            return Err(Halt::EmptyDraft);
        }

        let loaded: HashSet<&str> = sources.iter().map(|s| s.source_id.as_str()).collect();
        let mut seen = HashSet::new();
        let citations: Vec<String> = draft
            .citations
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| loaded.contains(c.as_str()) && seen.insert(c.clone()))
            .collect();
        debug!(chars = text.chars().count(), ?citations, "answer.generate");

        if self.policy.require_citations && citations.is_empty() {
            return Err(Halt::NoCitations);
        }
        Ok(Draft { text, citations })
    }

    async fn verify(&self, draft: &Draft, sources: &[LoadedSource]) -> Result<(), Halt> {
        let verdict = self
            .llm_retry
            .run("verify", || {
                self.model
                    .verify(&draft.text, sources, &self.prompts.verification)
            })
            .await
            .map_err(|e| Halt::Failed {
                stage: Stage::Verify,
                error: e.to_string(),
            })?;
        debug!(?verdict, "answer.verify");

        if verdict.is_good_enough {
            Ok(())
        } else {
            Err(Halt::Rejected {
                issues: verdict.issues,
            })
        }
    }
}

/// Cut to at most `max` characters, never splitting a character.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Append cited URLs so readers can open the primary references.
fn with_source_links(text: &str, citations: &[String]) -> String {
    let links: Vec<&str> = citations
        .iter()
        .map(String::as_str)
        .filter(|c| is_url(c))
        .collect();
    if links.is_empty() {
        return text.to_string();
    }
    let list = links
        .iter()
        .map(|url| format!("- {url}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{text}\n\nSources:\n{list}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedModel, StaticKnowledge, answerable, user_conversation};
    use steward_core::answer::{GateDecision, VerificationResult};
    use steward_core::error::{KnowledgeError, ProviderError};

    fn orchestrator(model: Arc<ScriptedModel>, knowledge: Arc<StaticKnowledge>) -> AnswerOrchestrator {
        AnswerOrchestrator::new(
            model,
            knowledge,
            PromptSet::from_config(&AnswerConfig::default()),
            AnswerPolicy::default(),
        )
        .with_llm_retry(RetryPolicy::new(2, Duration::from_millis(10)))
        .with_load_retry(RetryPolicy::once())
    }

    #[test]
    fn from_config_saturates_attempt_count() {
        let mut config = AppConfig::default();
        config.llm.max_retries = u32::MAX;
        let orchestrator = AnswerOrchestrator::from_config(
            Arc::new(ScriptedModel::new()),
            knowledge(),
            &config,
        );
        assert_eq!(orchestrator.llm_retry.max_attempts, u32::MAX);
        assert_eq!(orchestrator.load_retry.max_attempts, u32::MAX);
    }

    fn knowledge() -> Arc<StaticKnowledge> {
        Arc::new(
            StaticKnowledge::new("install.md\nInstalling\n\nhttps://docs.example.com/faq\nFAQ")
                .with_source("install.md", "Run the installer.")
                .with_source("https://docs.example.com/faq", "Frequently asked."),
        )
    }

    fn request() -> RequestContext {
        RequestContext {
            channel_id: "help".into(),
            thread_id: None,
            message_id: "m1".into(),
        }
    }

    #[tokio::test]
    async fn full_run_replies_with_citations() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate(answerable(Some("install steps")))
                .select(vec!["install.md"])
                .generate("Run the installer.", vec!["install.md"]),
        );
        let result = orchestrator(model.clone(), knowledge())
            .generate_reply(&user_conversation("how do I install?"), &request())
            .await;

        assert!(result.should_reply);
        assert_eq!(result.reply_text.as_deref(), Some("Run the installer."));
        assert_eq!(result.citations, vec!["install.md"]);
        assert_eq!(model.select_queries(), vec!["install steps"]);
        assert_eq!(model.calls("verify"), 0);
    }

    #[tokio::test]
    async fn unanswerable_skips_every_later_stage() {
        let model = Arc::new(ScriptedModel::new().gate(GateDecision {
            is_question: true,
            is_answerable: false,
            rewrite_query: None,
            reason: "off topic".into(),
        }));
        let knowledge = knowledge();
        let result = orchestrator(model.clone(), knowledge.clone())
            .generate_reply(&user_conversation("what's for lunch?"), &request())
            .await;

        assert!(!result.should_reply);
        assert_eq!(result.debug["stage"], "gate");
        for stage in ["select", "generate", "verify"] {
            assert_eq!(model.calls(stage), 0);
        }
        assert_eq!(knowledge.loads(), 0);
    }

    #[tokio::test]
    async fn query_falls_back_to_latest_user_text() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate(answerable(None))
                .select(vec!["install.md"])
                .generate("Do this.", vec!["install.md"]),
        );
        orchestrator(model.clone(), knowledge())
            .generate_reply(&user_conversation("installer crashes"), &request())
            .await;
        assert_eq!(model.select_queries(), vec!["installer crashes"]);
    }

    #[tokio::test]
    async fn fabricated_citations_are_dropped() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate(answerable(None))
                .select(vec!["install.md", "missing.md"])
                .generate("Answer.", vec!["install.md", "invented.md", "missing.md"]),
        );
        let result = orchestrator(model, knowledge())
            .generate_reply(&user_conversation("q?"), &request())
            .await;

        assert!(result.should_reply);
        assert_eq!(result.citations, vec!["install.md"]);
    }

    #[tokio::test]
    async fn no_valid_citation_is_silent_when_required() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate(answerable(None))
                .select(vec!["install.md"])
                .generate("Guessing.", vec!["invented.md"]),
        );
        let result = orchestrator(model, knowledge())
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert!(!result.should_reply);
        assert_eq!(result.debug["halt"], "no_citations");
    }

    #[tokio::test]
    async fn selection_is_deduped_and_capped() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate(answerable(None))
                .select(vec!["a", "a", "b", "c", "d", "e"])
                .generate("x", vec!["a"]),
        );
        let knowledge = Arc::new(
            StaticKnowledge::new("index")
                .with_source("a", "A")
                .with_source("b", "B")
                .with_source("c", "C"),
        );
        let result = orchestrator(model, knowledge.clone())
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert!(result.should_reply);
        assert_eq!(knowledge.loads(), 3);
    }

    #[tokio::test]
    async fn partial_load_failure_continues() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate(answerable(None))
                .select(vec!["broken.md", "install.md"])
                .generate("Run it.", vec!["install.md"]),
        );
        let knowledge = Arc::new(
            StaticKnowledge::new("index")
                .with_source("install.md", "Run the installer.")
                .with_failure(
                    "broken.md",
                    KnowledgeError::ReadFailed {
                        source_id: "broken.md".into(),
                        reason: "permission denied".into(),
                    },
                ),
        );
        let result = orchestrator(model, knowledge)
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert!(result.should_reply);
        assert_eq!(result.debug["loaded"], json!(["install.md"]));
    }

    #[tokio::test]
    async fn nothing_loaded_is_silent() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate(answerable(None))
                .select(vec!["missing.md"]),
        );
        let result = orchestrator(model.clone(), knowledge())
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert!(!result.should_reply);
        assert_eq!(result.debug["stage"], "load");
        assert_eq!(model.calls("generate"), 0);
    }

    #[tokio::test]
    async fn empty_selection_and_empty_index_are_silent() {
        let model = Arc::new(ScriptedModel::new().gate(answerable(None)).select(vec![]));
        let result = orchestrator(model, knowledge())
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert_eq!(result.debug["halt"], "no_selection");

        let model = Arc::new(ScriptedModel::new().gate(answerable(None)));
        let result = orchestrator(model.clone(), Arc::new(StaticKnowledge::new("  ")))
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert!(!result.should_reply);
        assert_eq!(model.calls("select"), 0);
    }

    #[tokio::test]
    async fn verification_can_reject() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate(answerable(None))
                .select(vec!["install.md"])
                .generate("Run it.", vec!["install.md"])
                .verify(VerificationResult {
                    is_good_enough: false,
                    issues: vec!["unclear".into()],
                    suggested_fix: None,
                }),
        );
        let mut policy = AnswerPolicy::default();
        policy.enable_verification = true;
        let orchestrator = AnswerOrchestrator::new(
            model.clone(),
            knowledge(),
            PromptSet::from_config(&AnswerConfig::default()),
            policy,
        );
        let result = orchestrator
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert!(!result.should_reply);
        assert_eq!(result.debug["stage"], "verify");
        assert_eq!(model.calls("verify"), 1);
    }

    #[tokio::test]
    async fn url_citations_are_linked() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate(answerable(None))
                .select(vec!["https://docs.example.com/faq", "install.md"])
                .generate(
                    "See the FAQ.",
                    vec!["https://docs.example.com/faq", "install.md"],
                ),
        );
        let result = orchestrator(model, knowledge())
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert_eq!(
            result.reply_text.as_deref(),
            Some("See the FAQ.\n\nSources:\n- https://docs.example.com/faq")
        );
    }

    #[tokio::test]
    async fn answers_are_bounded() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate(answerable(None))
                .select(vec!["install.md"])
                .generate(&"é".repeat(50), vec!["install.md"]),
        );
        let mut policy = AnswerPolicy::default();
        policy.max_answer_chars = 10;
        let orchestrator = AnswerOrchestrator::new(
            model,
            knowledge(),
            PromptSet::from_config(&AnswerConfig::default()),
            policy,
        );
        let result = orchestrator
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert_eq!(result.reply_text.unwrap().chars().count(), 10);
    }

    #[tokio::test]
    async fn permanent_errors_are_silent_and_not_retried() {
        let model = Arc::new(
            ScriptedModel::new().gate_error(ProviderError::Schema("missing is_question".into())),
        );
        let result = orchestrator(model.clone(), knowledge())
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert!(!result.should_reply);
        assert_eq!(result.debug["halt"], "error");
        assert_eq!(model.calls("gate"), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate_error(ProviderError::ApiError {
                    status_code: 503,
                    message: "overloaded".into(),
                })
                .gate(answerable(None))
                .select(vec!["install.md"])
                .generate("ok", vec!["install.md"]),
        );
        let result = orchestrator(model.clone(), knowledge())
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert!(result.should_reply);
        assert_eq!(model.calls("gate"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_timeout_is_silent() {
        let model = Arc::new(
            ScriptedModel::new()
                .gate(answerable(None))
                .select(vec!["install.md"])
                .generate("late", vec!["install.md"])
                .with_delay(Duration::from_secs(60)),
        );
        let mut policy = AnswerPolicy::default();
        policy.graph_timeout = Duration::from_secs(5);
        let orchestrator = AnswerOrchestrator::new(
            model,
            knowledge(),
            PromptSet::from_config(&AnswerConfig::default()),
            policy,
        );
        let result = orchestrator
            .generate_reply(&user_conversation("q?"), &request())
            .await;
        assert!(!result.should_reply);
        assert_eq!(result.debug["halt"], "timeout");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn links_only_for_urls() {
        assert_eq!(with_source_links("A", &["doc.md".into()]), "A");
        assert_eq!(
            with_source_links("A", &["http://x.io/a".into(), "https://y.io/b".into()]),
            "A\n\nSources:\n- http://x.io/a\n- https://y.io/b"
        );
    }
}
