//! Configuration loading, validation, and management for Steward.
//!
//! Loads configuration from `~/.steward/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use steward_core::message::Identities;

/// The root configuration structure.
///
/// Maps directly to `~/.steward/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Process-wide switches
    #[serde(default)]
    pub app: AppSettings,

    /// Bot and team identities used to classify authors
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Quiet-window batching
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Reply-chain resolution limits
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Language-model endpoint and per-call policy
    #[serde(default)]
    pub llm: LlmConfig,

    /// Answer workflow policy and prompts
    #[serde(default)]
    pub answer: AnswerConfig,

    /// Image input handling
    #[serde(default)]
    pub images: ImageConfig,

    /// Knowledge source locations
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Gateway write policy
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log replies instead of posting them
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// The bot's own platform user ID
    #[serde(default)]
    pub bot_user_id: String,

    /// Platform user IDs of team members
    #[serde(default)]
    pub team_member_ids: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            bot_user_id: "steward".into(),
            team_member_ids: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Author inactivity required before a batch is finalized
    #[serde(default = "default_quiet_window_ms")]
    pub quiet_window_ms: u64,
}

fn default_quiet_window_ms() -> u64 {
    8_000
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: default_quiet_window_ms(),
        }
    }
}

impl BatchingConfig {
    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum number of reply hops to walk up
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum neighbours read on each side of a referenced message
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,

    /// Largest gap between two messages of one group. Defaults to the
    /// batching quiet window when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_gap_ms: Option<u64>,
}

fn default_max_depth() -> usize {
    5
}
fn default_scan_limit() -> usize {
    20
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            scan_limit: default_scan_limit(),
            group_gap_ms: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    /// Timeout for a single call
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound of the random delay added to each backoff
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_llm_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_retry_jitter_ms() -> u64 {
    250
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_jitter_ms", &self.retry_jitter_ms)
            .finish()
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    /// End-to-end budget for one answer attempt
    #[serde(default = "default_graph_timeout_secs")]
    pub graph_timeout_secs: u64,

    #[serde(default)]
    pub enable_verification: bool,

    /// Stay silent when the draft cites nothing
    #[serde(default = "default_true")]
    pub require_citations: bool,

    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    #[serde(default = "default_max_answer_chars")]
    pub max_answer_chars: usize,

    /// Appended to every system prompt
    #[serde(default)]
    pub project_introduction: String,

    #[serde(default = "default_gating_prompt")]
    pub gating_prompt: String,

    #[serde(default = "default_selection_prompt")]
    pub selection_prompt: String,

    #[serde(default = "default_answer_prompt")]
    pub answer_prompt: String,

    #[serde(default = "default_verification_prompt")]
    pub verification_prompt: String,
}

fn default_graph_timeout_secs() -> u64 {
    120
}
fn default_max_sources() -> usize {
    3
}
fn default_max_answer_chars() -> usize {
    1800
}
fn default_gating_prompt() -> String {
    "You triage messages in a community support channel. Decide whether the latest \
     user message asks a question, and whether it could be answered from project \
     documentation. When it is answerable, rewrite it as a standalone search query."
        .into()
}
fn default_selection_prompt() -> String {
    "You are given a knowledge base index. Each entry starts with a source identifier \
     line followed by a short description. Return the identifiers of the sources most \
     likely to answer the query, best first."
        .into()
}
fn default_answer_prompt() -> String {
    "Answer the user's question using only the provided sources. Be concise and \
     friendly. List the identifiers of the sources you relied on as citations. If the \
     sources do not contain the answer, return an empty answer."
        .into()
}
fn default_verification_prompt() -> String {
    "Review the draft answer against the sources. Approve it only if it is accurate, \
     safe to post publicly, and clearly written."
        .into()
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            graph_timeout_secs: default_graph_timeout_secs(),
            enable_verification: false,
            require_citations: true,
            max_sources: default_max_sources(),
            max_answer_chars: default_max_answer_chars(),
            project_introduction: String::new(),
            gating_prompt: default_gating_prompt(),
            selection_prompt: default_selection_prompt(),
            answer_prompt: default_answer_prompt(),
            verification_prompt: default_verification_prompt(),
        }
    }
}

/// How images are encoded into model requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    /// `{"type": "image_url", "image_url": {"url": "data:..."}}`
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// `{"inline_data": {"mime_type": ..., "data": ...}}`
    #[serde(rename = "gemini")]
    Gemini,
    /// `{"type": "image", "url": "data:..."}`
    #[serde(rename = "open_source")]
    OpenSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub format: ImageFormat,

    #[serde(default = "default_image_timeout_secs")]
    pub download_timeout_secs: u64,

    #[serde(default = "default_image_retries")]
    pub download_max_retries: u32,
}

fn default_image_timeout_secs() -> u64 {
    20
}
fn default_image_retries() -> u32 {
    2
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: ImageFormat::default(),
            download_timeout_secs: default_image_timeout_secs(),
            download_max_retries: default_image_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Index text file read by the selection step
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Root directory for file sources
    #[serde(default = "default_sources_dir")]
    pub sources_dir: PathBuf,

    /// Timeout for a single source load
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,

    /// Sources larger than this are truncated
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,
}

fn default_index_path() -> PathBuf {
    AppConfig::config_dir().join("knowledge").join("index.txt")
}
fn default_sources_dir() -> PathBuf {
    AppConfig::config_dir().join("knowledge").join("sources")
}
fn default_load_timeout_secs() -> u64 {
    15
}
fn default_max_source_bytes() -> usize {
    200_000
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            sources_dir: default_sources_dir(),
            load_timeout_secs: default_load_timeout_secs(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Attempts for thread creation and posting
    #[serde(default = "default_post_attempts")]
    pub post_attempts: u32,

    #[serde(default = "default_post_base_delay_ms")]
    pub post_base_delay_ms: u64,
}

fn default_post_attempts() -> u32 {
    3
}
fn default_post_base_delay_ms() -> u64 {
    500
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            post_attempts: default_post_attempts(),
            post_base_delay_ms: default_post_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.steward/config.toml)
    /// and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_dir().join("config.toml");
        Self::load_with_env(&path)
    }

    /// Load from a specific file path and apply environment overrides.
    ///
    /// Environment variables:
    /// - `STEWARD_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `STEWARD_MODEL`, `STEWARD_BASE_URL`, `STEWARD_BOT_USER_ID`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("STEWARD_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("STEWARD_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("STEWARD_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(bot) = lookup("STEWARD_BOT_USER_ID") {
            self.identity.bot_user_id = bot;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".steward")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.bot_user_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "identity.bot_user_id must not be empty".into(),
            ));
        }
        if self.batching.quiet_window_ms == 0 {
            return Err(ConfigError::ValidationError(
                "batching.quiet_window_ms must be > 0".into(),
            ));
        }
        if self.resolver.scan_limit == 0 {
            return Err(ConfigError::ValidationError(
                "resolver.scan_limit must be > 0".into(),
            ));
        }
        if self.llm.timeout_secs == 0 || self.answer.graph_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm.timeout_secs and answer.graph_timeout_secs must be > 0".into(),
            ));
        }
        if self.answer.max_sources == 0 || self.answer.max_answer_chars == 0 {
            return Err(ConfigError::ValidationError(
                "answer.max_sources and answer.max_answer_chars must be > 0".into(),
            ));
        }
        let prompts = [
            ("gating_prompt", &self.answer.gating_prompt),
            ("selection_prompt", &self.answer.selection_prompt),
            ("answer_prompt", &self.answer.answer_prompt),
            ("verification_prompt", &self.answer.verification_prompt),
        ];
        for (name, prompt) in prompts {
            if prompt.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "answer.{name} must not be empty"
                )));
            }
        }
        if self.gateway.post_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.post_attempts must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Author classification inputs.
    pub fn identities(&self) -> Identities {
        Identities::new(
            self.identity.bot_user_id.clone(),
            self.identity.team_member_ids.iter().cloned(),
        )
    }

    /// Gap used to group consecutive messages during reply-chain expansion.
    pub fn group_gap(&self) -> Duration {
        Duration::from_millis(
            self.resolver
                .group_gap_ms
                .unwrap_or(self.batching.quiet_window_ms),
        )
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
