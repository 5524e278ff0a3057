//! OpenAI-compatible answer model.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, and any endpoint exposing
//! `/chat/completions` with JSON-schema structured output. Each capability
//! is one request whose reply must parse into the capability's schema;
//! anything else is a [`ProviderError::Schema`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use steward_config::{ImageConfig, ImageFormat, LlmConfig};
use steward_core::answer::{Draft, GateDecision, LoadedSource, VerificationResult};
use steward_core::conversation::{Conversation, Role};
use steward_core::error::ProviderError;
use steward_core::provider::AnswerModel;
use tracing::{debug, trace, warn};

use crate::content::build_user_content;

/// An OpenAI-compatible structured-output client.
pub struct OpenAiCompatModel {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    image_format: ImageFormat,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    /// Create a new client for an OpenAI-compatible endpoint.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            temperature: 0.0,
            image_format: ImageFormat::default(),
            client,
        })
    }

    /// Build from the `[llm]` and `[images]` config sections.
    pub fn from_config(llm: &LlmConfig, images: &ImageConfig) -> Result<Self, ProviderError> {
        let model = Self::new(
            "openai_compat",
            &llm.base_url,
            &llm.model,
            Duration::from_secs(llm.timeout_secs),
        )?
        .with_temperature(llm.temperature)
        .with_image_format(images.format);

        Ok(match &llm.api_key {
            Some(key) => model.with_api_key(key),
            None => model,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_image_format(mut self, format: ImageFormat) -> Self {
        self.image_format = format;
        self
    }

    /// System prompt followed by the role-tagged conversation.
    fn conversation_messages(&self, system: &str, conversation: &Conversation) -> Vec<Value> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(json!({ "role": "system", "content": system }));
        for message in &conversation.messages {
            let content = match message.role {
                Role::User => build_user_content(&message.text, &message.images, self.image_format),
                Role::Assistant => Value::String(message.text.clone()),
            };
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": content }));
        }
        messages
    }

    /// Send one chat completion and parse the reply against `schema`.
    async fn complete_json<T: DeserializeOwned>(
        &self,
        messages: Vec<Value>,
        schema_name: &str,
        schema: Value,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "stream": false,
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": schema_name, "strict": true, "schema": schema },
            },
        });

        debug!(provider = %self.name, model = %self.model, schema = schema_name, "Sending structured request");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(status_error(status, error_body, retry_after));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Schema(format!("Failed to parse response: {e}")))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Schema("No content in response".into()))?;

        trace!(schema = schema_name, content = %content, "Structured reply");
        parse_structured(&content)
    }
}

/// Map an HTTP failure status to a provider error.
fn status_error(status: u16, body: String, retry_after: Option<u64>) -> ProviderError {
    match status {
        400 | 422 => ProviderError::InvalidRequest(body),
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        408 => ProviderError::Timeout(body),
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(5),
        },
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

/// Parse a structured reply, tolerating a Markdown code fence around it.
fn parse_structured<T: DeserializeOwned>(content: &str) -> Result<T, ProviderError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(unfenced.trim()).map_err(|e| ProviderError::Schema(e.to_string()))
}

fn render_sources(sources: &[LoadedSource]) -> String {
    sources
        .iter()
        .map(|s| format!("=== Source: {} ===\n{}", s.source_id, s.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl AnswerModel for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn gate(
        &self,
        conversation: &Conversation,
        prompt: &str,
    ) -> Result<GateDecision, ProviderError> {
        let schema = json!({
            "type": "object",
            "properties": {
                "is_question": { "type": "boolean" },
                "is_answerable": { "type": "boolean" },
                "rewrite_query": { "type": ["string", "null"] },
                "reason": { "type": "string" },
            },
            "required": ["is_question", "is_answerable", "rewrite_query", "reason"],
            "additionalProperties": false,
        });
        let mut decision: GateDecision = self
            .complete_json(self.conversation_messages(prompt, conversation), "gate", schema)
            .await?;
        decision.rewrite_query = decision
            .rewrite_query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());
        Ok(decision)
    }

    async fn select(
        &self,
        query: &str,
        index_text: &str,
        prompt: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let schema = json!({
            "type": "object",
            "properties": {
                "source_ids": { "type": "array", "items": { "type": "string" } },
            },
            "required": ["source_ids"],
            "additionalProperties": false,
        });
        let messages = vec![
            json!({ "role": "system", "content": prompt }),
            json!({
                "role": "user",
                "content": format!("Query:\n{query}\n\nKnowledge base index:\n{index_text}"),
            }),
        ];
        let reply: SelectReply = self.complete_json(messages, "select", schema).await?;
        Ok(reply
            .source_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect())
    }

    async fn generate(
        &self,
        conversation: &Conversation,
        sources: &[LoadedSource],
        prompt: &str,
    ) -> Result<Draft, ProviderError> {
        let schema = json!({
            "type": "object",
            "properties": {
                "answer": { "type": "string" },
                "citations": { "type": "array", "items": { "type": "string" } },
            },
            "required": ["answer", "citations"],
            "additionalProperties": false,
        });
        let system = format!("{prompt}\n\nSources:\n{}", render_sources(sources));
        let reply: AnswerReply = self
            .complete_json(self.conversation_messages(&system, conversation), "answer", schema)
            .await?;
        Ok(Draft {
            text: reply.answer,
            citations: reply.citations,
        })
    }

    async fn verify(
        &self,
        draft: &str,
        sources: &[LoadedSource],
        prompt: &str,
    ) -> Result<VerificationResult, ProviderError> {
        let schema = json!({
            "type": "object",
            "properties": {
                "is_good_enough": { "type": "boolean" },
                "issues": { "type": "array", "items": { "type": "string" } },
                "suggested_fix": { "type": ["string", "null"] },
            },
            "required": ["is_good_enough", "issues", "suggested_fix"],
            "additionalProperties": false,
        });
        let messages = vec![
            json!({ "role": "system", "content": prompt }),
            json!({
                "role": "user",
                "content": format!(
                    "Sources:\n{}\n\nDraft answer:\n{draft}",
                    render_sources(sources)
                ),
            }),
        ];
        self.complete_json(messages, "verify", schema).await
    }
}

// --- OpenAI API types (internal) ---

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectReply {
    source_ids: Vec<String>,
}

#[derive(Deserialize)]
struct AnswerReply {
    answer: String,
    #[serde(default)]
    citations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::conversation::{ConversationMessage, ImagePayload};

    fn model() -> OpenAiCompatModel {
        OpenAiCompatModel::new(
            "test",
            "http://localhost:11434/v1/",
            "llama3",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        assert_eq!(model().base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn from_config_carries_key_and_format() {
        let llm = LlmConfig {
            api_key: Some("sk-test".into()),
            ..LlmConfig::default()
        };
        let images = ImageConfig {
            format: ImageFormat::Gemini,
            ..ImageConfig::default()
        };
        let model = OpenAiCompatModel::from_config(&llm, &images).unwrap();
        assert_eq!(model.api_key.as_deref(), Some("sk-test"));
        assert_eq!(model.image_format, ImageFormat::Gemini);
        assert_eq!(model.model, "gpt-4o-mini");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(400, "bad".into(), None),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(
            status_error(401, String::new(), None),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            status_error(429, String::new(), Some(12)),
            ProviderError::RateLimited { retry_after_secs: 12 }
        ));
        let err = status_error(503, "down".into(), None);
        assert!(err.is_retriable());
        assert!(!status_error(422, String::new(), None).is_retriable());
    }

    #[test]
    fn structured_reply_parses_plain_and_fenced() {
        let plain: SelectReply = parse_structured(r#"{"source_ids":["a","b"]}"#).unwrap();
        assert_eq!(plain.source_ids, vec!["a", "b"]);

        let fenced: AnswerReply =
            parse_structured("```json\n{\"answer\":\"hi\",\"citations\":[\"a\"]}\n```").unwrap();
        assert_eq!(fenced.answer, "hi");
        assert_eq!(fenced.citations, vec!["a"]);
    }

    #[test]
    fn malformed_reply_is_schema_error() {
        let err = parse_structured::<SelectReply>("not json").unwrap_err();
        assert!(matches!(err, ProviderError::Schema(_)));
        assert!(!err.is_retriable());
    }

    #[test]
    fn gate_reply_parses_into_decision() {
        let decision: GateDecision = parse_structured(
            r#"{"is_question":true,"is_answerable":true,"rewrite_query":null,"reason":"docs"}"#,
        )
        .unwrap();
        assert!(decision.is_question);
        assert!(decision.rewrite_query.is_none());
    }

    #[test]
    fn conversation_messages_start_with_system() {
        let mut user = ConversationMessage::user("how do I install?");
        user.images.push(ImagePayload {
            base64_data: "AAAA".into(),
            mime_type: "image/png".into(),
            source_url: "https://cdn.example.com/x.png".into(),
            filename: None,
        });
        let conversation = Conversation::new(vec![
            user,
            ConversationMessage::assistant("Which OS?"),
        ]);

        let messages = model().conversation_messages("sys", &conversation);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert!(messages[1]["content"].is_array());
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[2]["content"], "Which OS?");
    }

    #[test]
    fn sources_render_with_headers() {
        let rendered = render_sources(&[
            LoadedSource {
                source_id: "install.md".into(),
                text: "Run the installer.\n".into(),
            },
            LoadedSource {
                source_id: "https://docs.example.com/faq".into(),
                text: "FAQ".into(),
            },
        ]);
        assert!(rendered.starts_with("=== Source: install.md ===\nRun the installer."));
        assert!(rendered.contains("=== Source: https://docs.example.com/faq ===\nFAQ"));
    }

    // --- HTTP round trips against a mock server ---

    fn completion(content: &str) -> String {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
            .to_string()
    }

    fn mock_model(server: &mockito::ServerGuard) -> OpenAiCompatModel {
        OpenAiCompatModel::new("test", server.url(), "llama3", Duration::from_secs(5))
            .unwrap()
            .with_api_key("sk-test")
    }

    #[tokio::test]
    async fn select_sends_schema_request_and_reads_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "llama3",
                "stream": false,
                "response_format": {
                    "type": "json_schema",
                    "json_schema": { "name": "select", "strict": true },
                },
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion(r#"{"source_ids":[" install.md ",""]}"#))
            .create_async()
            .await;

        let ids = mock_model(&server)
            .select("install", "install.md\nInstalling", "pick sources")
            .await
            .unwrap();

        assert_eq!(ids, vec!["install.md"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("retry-after", "7")
            .with_body("slow down")
            .create_async()
            .await;

        let err = mock_model(&server)
            .verify("draft", &[], "check")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after_secs: 7 }));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn server_error_is_retriable_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let err = mock_model(&server)
            .gate(&Conversation::new(vec![ConversationMessage::user("hi")]), "gate")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status_code: 503, .. }));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn missing_content_is_schema_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = mock_model(&server)
            .select("q", "index", "pick")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Schema(_)));
    }
}
