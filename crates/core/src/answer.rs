//! Per-request records produced by the answer orchestrator stages.
//!
//! Each record is created by one stage, read by the next, and dropped when
//! the request finishes. None of them are shared across requests.

use serde::{Deserialize, Serialize};

/// Output of the GATE stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub is_question: bool,
    pub is_answerable: bool,
    /// A self-contained retrieval query, when the model produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_query: Option<String>,
    #[serde(default)]
    pub reason: String,
}

/// Output of the SELECT stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub query: String,
    pub source_ids: Vec<String>,
}

/// A knowledge source whose full content was loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedSource {
    pub source_id: String,
    pub text: String,
}

impl LoadedSource {
    pub fn is_url(&self) -> bool {
        is_url(&self.source_id)
    }
}

/// Output of the GENERATE stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Output of the VERIFY stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub is_good_enough: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

/// Terminal result of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AIResult {
    pub should_reply: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_text: Option<String>,
    #[serde(default)]
    pub citations: Vec<String>,
    /// Diagnostics for logs. Never shown to end users.
    #[serde(default)]
    pub debug: serde_json::Map<String, serde_json::Value>,
}

impl AIResult {
    /// A "stay quiet" result carrying diagnostics.
    pub fn silent(debug: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            should_reply: false,
            reply_text: None,
            citations: Vec::new(),
            debug,
        }
    }

    pub fn reply(text: impl Into<String>, citations: Vec<String>) -> Self {
        Self {
            should_reply: true,
            reply_text: Some(text.into()),
            citations,
            debug: serde_json::Map::new(),
        }
    }

    /// The text to publish, if this result asks for a reply at all.
    pub fn publishable_text(&self) -> Option<&str> {
        if !self.should_reply {
            return None;
        }
        self.reply_text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Whether a source identifier is an http(s) URL.
pub fn is_url(source_id: &str) -> bool {
    source_id.starts_with("http://") || source_id.starts_with("https://")
}
