use crate::agent::CompletionClient;
use crate::config::Config;
use crate::providers::{GeminiProvider, OpenAIProvider, ScriptedProvider};
use crate::traits::{ChatResponse, Provider};
use anyhow::{Result, anyhow, bail};
use std::sync::Arc;

pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider_name = config.provider.to_lowercase();

    match provider_name.as_str() {
        "gemini" | "google" => {
            let api_key = require_api_key(config)?;
            let mut provider = GeminiProvider::new(api_key);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "openai" => {
            let api_key = require_api_key(config)?;
            let mut provider = OpenAIProvider::new(api_key);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "scripted" | "offline" => Ok(Arc::new(ScriptedProvider::new(|request| {
            let input = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == "user")
                .map(|m| m.content.as_str())
                .unwrap_or("");
            Ok(ChatResponse::text(format!("[offline] {input}")))
        }))),
        _ => Err(anyhow!(
            "Unknown provider: {}. Available: gemini, openai, scripted",
            config.provider
        )),
    }
}

pub fn create_client(config: &Config) -> Result<CompletionClient> {
    let provider = create_provider(config)?;
    Ok(CompletionClient::new(provider, config.model.clone())
        .with_retry(config.retry.to_policy()?)
        .with_max_tool_rounds(config.max_tool_rounds))
}

fn require_api_key(config: &Config) -> Result<String> {
    let key = config.api_key.trim();
    if key.is_empty() {
        bail!(
            "No API key found for provider '{}'. Set one of {} or run 'troupe onboard'.",
            config.provider,
            crate::config::api_key_env_vars(&config.provider.to_lowercase()).join(", ")
        );
    }
    Ok(key.to_string())
}
