//! Profile-text providers and selection from `[ai]` config.

use std::sync::Arc;
use std::time::Duration;

use scholarhub_core::AiConfig;
use scholarhub_science::ProfileTextGenerator;
use tracing::{info, warn};

use crate::error::{AiError, Result};

pub mod anthropic;
pub mod chat;

pub use anthropic::AnthropicProvider;
pub use chat::ChatCompletionsProvider;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sampling settings shared by every provider.
#[derive(Debug, Clone)]
pub struct Generation {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl From<&AiConfig> for Generation {
    fn from(cfg: &AiConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        }
    }
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Builds the configured provider, reading its key through `lookup`.
///
/// `Ok(None)` when the provider is `"none"` or its API key is not set; the
/// enricher then writes template profiles.
pub fn provider_with_env(
    cfg: &AiConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<Arc<dyn ProfileTextGenerator>>> {
    let provider = cfg.provider.trim().to_lowercase();
    if provider == "none" || provider.is_empty() {
        return Ok(None);
    }

    let endpoint = match (provider.as_str(), cfg.endpoint.clone()) {
        (_, Some(custom)) => custom,
        ("openai", None) => OPENAI_ENDPOINT.to_string(),
        ("openrouter", None) => OPENROUTER_ENDPOINT.to_string(),
        ("anthropic", None) => ANTHROPIC_ENDPOINT.to_string(),
        ("custom", None) => return Err(AiError::MissingEndpoint(provider)),
        (other, None) => return Err(AiError::UnknownProvider(other.to_string())),
    };

    let Some(api_key) = lookup(&cfg.api_key_env).filter(|k| !k.trim().is_empty()) else {
        warn!(provider = %provider, env = %cfg.api_key_env, "AI API key not set, using template profiles");
        return Ok(None);
    };

    let generation = Generation::from(cfg);
    info!(provider = %provider, model = %generation.model, "profile text provider ready");
    let generator: Arc<dyn ProfileTextGenerator> = match provider.as_str() {
        "anthropic" => Arc::new(AnthropicProvider::new(http_client()?, endpoint, api_key, generation)),
        "openai" | "openrouter" | "custom" => {
            Arc::new(ChatCompletionsProvider::new(http_client()?, endpoint, api_key, generation))
        }
        other => return Err(AiError::UnknownProvider(other.to_string())),
    };
    Ok(Some(generator))
}

pub fn provider_from_config(cfg: &AiConfig) -> Result<Option<Arc<dyn ProfileTextGenerator>>> {
    provider_with_env(cfg, |key| std::env::var(key).ok())
}

/// Trims the reply and drops wrapping quotes some models add.
pub(crate) fn clean_reply(text: &str) -> Option<String> {
    let trimmed = text.trim().trim_matches('"').trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
