//! Language-model clients for Steward.
//!
//! All clients implement the `steward_core::AnswerModel` trait. The
//! orchestrator owns timeouts and retries, so each call here is a single
//! attempt.

pub mod content;
pub mod openai_compat;
pub mod prompts;

pub use content::build_user_content;
pub use openai_compat::OpenAiCompatModel;
pub use prompts::{PromptSet, compose_system_prompt};
