//! `steward run`: drive the pipeline from JSON-lines events on stdin.

use std::sync::Arc;

use steward_agent::Pipeline;
use steward_channels::InMemoryGateway;
use steward_config::AppConfig;
use steward_core::gateway::ChatGateway;
use steward_core::message::Message;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub async fn run(mut config: AppConfig, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    config.app.dry_run |= dry_run;

    let gateway = Arc::new(InMemoryGateway::new(config.identity.bot_user_id.clone()));
    let (model, knowledge) = super::collaborators(&config)?;
    let pipeline = Arc::new(Pipeline::from_config(
        gateway.clone(),
        model,
        knowledge,
        &config,
    )?);
    let handle = pipeline.start().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;
    let mut accepted = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Message>(&line) {
            Ok(message) => {
                gateway.inject(message).await?;
                accepted += 1;
            }
            Err(e) => warn!(line = line_no, error = %e, "Skipping malformed event"),
        }
    }

    info!(events = accepted, "Input exhausted, waiting for pending batches");
    gateway.stop().await?;
    handle.await?;

    for post in gateway.posts().await {
        println!("{}", serde_json::to_string(&post)?);
    }
    Ok(())
}
