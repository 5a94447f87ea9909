//! OpenAI-compatible `chat/completions` endpoints (OpenAI, OpenRouter, self-hosted).

use async_trait::async_trait;
use scholarhub_science::{ProfileFacts, ProfileTextGenerator};
use serde_json::{Value, json};
use tracing::debug;

use super::{Generation, clean_reply};
use crate::error::{AiError, Result};
use crate::prompt::researcher_profile_prompt;

pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    generation: Generation,
}

impl ChatCompletionsProvider {
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
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": self.generation.max_tokens,
            "temperature": self.generation.temperature,
        });
        debug!(endpoint = %self.endpoint, model = %self.generation.model, "chat completion request");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AiError::Api {
                provider: "chat".to_string(),
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let value: Value = resp.json().await?;
        let content = value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| AiError::EmptyResponse(self.endpoint.clone()))?;
        Ok(clean_reply(content))
    }
}

#[async_trait]
impl ProfileTextGenerator for ChatCompletionsProvider {
    async fn generate(&self, facts: &ProfileFacts) -> scholarhub_science::Result<Option<String>> {
        let prompt = researcher_profile_prompt(facts);
        Ok(self.complete(&prompt).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use scholarhub_science::ScienceError;

    fn generation() -> Generation {
        Generation {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 200,
            temperature: 0.7,
        }
    }

    fn provider(server: &mockito::Server) -> ChatCompletionsProvider {
        ChatCompletionsProvider::new(
            reqwest::Client::new(),
            format!("{}/v1/chat/completions", server.url()),
            "sk-test",
            generation(),
        )
    }

    fn facts() -> ProfileFacts {
        ProfileFacts {
            name: "Ada Lovelace".to_string(),
            affiliation: Some("MIT".to_string()),
            h_index: 12,
            paper_count: 40,
            interests: vec!["Computing".to_string()],
        }
    }

    #[tokio::test]
    async fn generates_profile_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 200,
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":" Ada Lovelace is a researcher at MIT. "}}]}"#,
            )
            .create_async()
            .await;

        let text = provider(&server).generate(&facts()).await.unwrap();
        assert_eq!(text.as_deref(), Some("Ada Lovelace is a researcher at MIT."));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_becomes_profile_text_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let err = provider(&server).generate(&facts()).await.unwrap_err();
        match err {
            ScienceError::ProfileText(msg) => assert!(msg.contains("429"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_reply_means_template() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"   "}}]}"#)
            .create_async()
            .await;

        assert_eq!(provider(&server).generate(&facts()).await.unwrap(), None);
    }
}
