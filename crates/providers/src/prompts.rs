//! System prompts for the four answer capabilities.

use steward_config::AnswerConfig;

/// Join a base prompt and the project introduction.
///
/// Blank parts are dropped; the introduction is labelled so the model can
/// tell it apart from instructions.
pub fn compose_system_prompt(base_prompt: &str, project_introduction: &str) -> String {
    let mut parts = Vec::new();
    if !base_prompt.trim().is_empty() {
        parts.push(base_prompt.trim().to_string());
    }
    if !project_introduction.trim().is_empty() {
        parts.push(format!(
            "Project introduction:\n{}",
            project_introduction.trim()
        ));
    }
    parts.join("\n\n")
}

/// Fully composed system prompts, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub gating: String,
    pub selection: String,
    pub answer: String,
    pub verification: String,
}

impl PromptSet {
    pub fn from_config(config: &AnswerConfig) -> Self {
        let intro = &config.project_introduction;
        Self {
            gating: compose_system_prompt(&config.gating_prompt, intro),
            selection: compose_system_prompt(&config.selection_prompt, intro),
            answer: compose_system_prompt(&config.answer_prompt, intro),
            verification: compose_system_prompt(&config.verification_prompt, intro),
        }
    }
}
