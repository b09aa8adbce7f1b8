use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{read_api_key, snippet, CompletionBackend, OutputSchema};
use crate::config::AiConfig;

const DEFAULT_URL: &str = "https://generativelanguage.googleapis.com";

/// Completion backend using the Gemini `generateContent` API.
///
/// Calls `POST {url}/v1beta/models/{model}:generateContent` with the key in
/// the `x-goog-api-key` header and asks for `application/json` output
/// constrained by the schema.
pub struct GeminiBackend {
    model: String,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    /// # Errors
    ///
    /// Returns an error if the API key variable is unset or the HTTP
    /// client cannot be built.
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
impl CompletionBackend for GeminiBackend {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, schema: &OutputSchema) -> Result<String> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema.to_openapi_schema(),
            },
        });

        tracing::debug!(model = %self.model, schema = schema.name, "gemini generateContent");

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("Gemini request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, snippet(&body_text));
        }

        let json: Value = response.json().await?;
        parse_gemini_response(&json)
    }
}

/// Pull the reply text out of `candidates[0].content.parts[*].text`.
fn parse_gemini_response(json: &Value) -> Result<String> {
    let candidate = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            anyhow!("Invalid Gemini response: {}", reason)
        })?;

    let parts = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing content parts"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        bail!("Invalid Gemini response: empty text");
    }
    Ok(text)
}
