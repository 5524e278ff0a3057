//! `steward config`: Configuration management commands.

use std::path::Path;

use steward_config::AppConfig;

pub fn validate(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match super::load_config(path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if config.llm.api_key.is_none() {
                warnings.push("No API key set (set STEWARD_API_KEY or OPENAI_API_KEY)");
            }
            if config.identity.team_member_ids.is_empty() {
                warnings.push("No team members listed; Q&A capture will never trigger");
            }
            if !config.knowledge.index_path.exists() {
                warnings.push("Knowledge index not found; every question will go unanswered");
            }
            if config.answer.project_introduction.trim().is_empty() {
                warnings.push("answer.project_introduction is empty");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Model:        {} @ {}", config.llm.model, config.llm.base_url);
            println!("   Bot user:     {}", config.identity.bot_user_id);
            println!("   Quiet window: {:?}", config.batching.quiet_window());
            println!("   Verify:       {}", config.answer.enable_verification);
            println!("   Images:       {}", config.images.enabled);
            println!("   Dry run:      {}", config.app.dry_run);
        }
        Err(e) => {
            println!("   ❌ {e}");
            return Err(e);
        }
    }

    Ok(())
}

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut redacted = config.clone();
    if redacted.llm.api_key.is_some() {
        redacted.llm.api_key = Some("[REDACTED]".into());
    }
    println!("{}", toml::to_string_pretty(&redacted)?);
    Ok(())
}

pub fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
    Ok(())
}

pub fn print_default() -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", AppConfig::default_toml());
    Ok(())
}
