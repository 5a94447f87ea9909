//! Anthropic Messages API.

use async_trait::async_trait;
use scholarhub_science::{ProfileFacts, ProfileTextGenerator};
use serde_json::{Value, json};
use tracing::debug;

use super::{Generation, clean_reply};
use crate::error::{AiError, Result};
use crate::prompt::researcher_profile_prompt;

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    generation: Generation,
}

impl AnthropicProvider {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        generation: Generation,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            generation,
        }
    }

    pub async fn complete(&self, prompt: &str) -> Result<Option<String>> {
        let body = json!({
            "model": self.generation.model,
            "max_tokens": self.generation.max_tokens,
            "temperature": self.generation.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });
        debug!(model = %self.generation.model, "anthropic messages request");

        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AiError::Api {
                provider: "anthropic".to_string(),
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let value: Value = resp.json().await?;
        let text = value
            .pointer("/content/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| AiError::EmptyResponse("anthropic".to_string()))?;
        Ok(clean_reply(text))
    }
}

#[async_trait]
impl ProfileTextGenerator for AnthropicProvider {
    async fn generate(&self, facts: &ProfileFacts) -> scholarhub_science::Result<Option<String>> {
        let prompt = researcher_profile_prompt(facts);
        Ok(self.complete(&prompt).await?)
    }
}
