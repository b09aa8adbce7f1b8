use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{read_api_key, snippet, CompletionBackend, OutputSchema};
use crate::config::AiConfig;

const DEFAULT_URL: &str = "https://api.openai.com";

/// Completion backend using the OpenAI chat completions API.
///
/// Calls `POST {url}/v1/chat/completions` with a strict `json_schema`
/// response format. Works with any gateway that speaks the same dialect.
pub struct OpenAiBackend {
    model: String,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let api_key = read_api_key(config)?;
        Self::new(
            config.model_name(),
            config.url.as_deref().unwrap_or(DEFAULT_URL),
            &api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(model: &str, url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            model: model.to_string(),
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, schema: &OutputSchema) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "strict": true,
                    "schema": schema.to_json_schema(),
                },
            },
        });

        tracing::debug!(model = %self.model, schema = schema.name, "openai chat completion");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("OpenAI request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, snippet(&body_text));
        }

        let json: Value = response.json().await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &Value) -> Result<String> {
    let message = json
        .pointer("/choices/0/message")
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices"))?;

    if let Some(refusal) = message.get("refusal").and_then(|r| r.as_str()) {
        bail!("model refused: {}", refusal);
    }

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing message content"))?;

    if content.trim().is_empty() {
        bail!("Invalid OpenAI response: empty content");
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_message_content() {
        let json = json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"summary\":\"ok\"}", "refusal": null } }]
        });
        assert_eq!(parse_openai_response(&json).unwrap(), "{\"summary\":\"ok\"}");
    }

    #[test]
    fn surfaces_refusal() {
        let json = json!({
            "choices": [{ "message": { "content": null, "refusal": "I can't help with that." } }]
        });
        let err = parse_openai_response(&json).unwrap_err();
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn rejects_missing_choices() {
        assert!(parse_openai_response(&json!({})).is_err());
    }
}
