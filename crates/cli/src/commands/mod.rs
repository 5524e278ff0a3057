pub mod ask;
pub mod config_cmd;
pub mod run;

use std::path::Path;
use std::sync::Arc;

use steward_config::AppConfig;
use steward_core::knowledge::KnowledgeSource;
use steward_core::provider::AnswerModel;
use steward_knowledge::FileSystemKnowledge;
use steward_providers::OpenAiCompatModel;

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    Ok(config.map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Build the model client and knowledge source from config.
pub fn collaborators(
    config: &AppConfig,
) -> Result<(Arc<dyn AnswerModel>, Arc<dyn KnowledgeSource>), Box<dyn std::error::Error>> {
    if config.llm.api_key.is_none() {
        tracing::warn!(
            base_url = %config.llm.base_url,
            "No API key configured (set STEWARD_API_KEY or OPENAI_API_KEY)"
        );
    }
    let model = OpenAiCompatModel::from_config(&config.llm, &config.images)?;
    let knowledge = FileSystemKnowledge::from_config(&config.knowledge)?;
    Ok((Arc::new(model), Arc::new(knowledge)))
}
