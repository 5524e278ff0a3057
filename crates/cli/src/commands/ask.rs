//! `steward ask`: one orchestrator run for a single question.

use steward_agent::AnswerOrchestrator;
use steward_config::AppConfig;
use steward_core::conversation::{Conversation, ConversationMessage, RequestContext};

pub async fn run(
    config: AppConfig,
    question: String,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (model, knowledge) = super::collaborators(&config)?;
    let orchestrator = AnswerOrchestrator::from_config(model, knowledge, &config);

    let conversation = Conversation::new(vec![ConversationMessage::user(question)]);
    let request = RequestContext {
        channel_id: "cli".into(),
        thread_id: None,
        message_id: "cli".into(),
    };
    let result = orchestrator.generate_reply(&conversation, &request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match result.publishable_text() {
        Some(text) => println!("{text}"),
        None => {
            let halt = result
                .debug
                .get("halt")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            eprintln!("No answer (halted: {halt}). Re-run with --json for details.");
        }
    }
    Ok(())
}
