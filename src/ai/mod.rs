//! Completion backend abstraction and implementations.
//!
//! Both AI adapters ([`extract`](crate::extract) and
//! [`summary`](crate::summary)) are a prompt plus a fixed output schema sent
//! to a hosted model. This module owns the transport:
//!
//! - **[`DisabledBackend`]**: returns errors; used when `ai.provider = "disabled"`.
//! - **[`GeminiBackend`]**: Google Generative Language `generateContent`
//!   with `responseMimeType = application/json` and a response schema.
//! - **[`OpenAiBackend`]**: OpenAI chat completions with a strict
//!   `json_schema` response format.
//!
//! # Failure model
//!
//! One request per call. Network errors, non-2xx statuses and empty replies
//! are returned as errors immediately; nothing is retried. Replies are
//! checked against the [`OutputSchema`] by [`decode_reply`] before any
//! field is trusted.

mod gemini;
mod openai;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::config::AiConfig;

/// JSON type of an output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
}

/// One required field of an output schema.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

/// Fixed shape of a structured reply. Every field is required.
#[derive(Debug, Clone, Copy)]
pub struct OutputSchema {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl OutputSchema {
    /// Render as JSON Schema with lowercase type names (OpenAI dialect).
    pub fn to_json_schema(&self) -> Value {
        self.render(
            |kind| match kind {
                FieldKind::String => "string",
                FieldKind::Number => "number",
            },
            "object",
            true,
        )
    }

    /// Render as an OpenAPI schema object with uppercase type names
    /// (Gemini dialect).
    pub fn to_openapi_schema(&self) -> Value {
        self.render(
            |kind| match kind {
                FieldKind::String => "STRING",
                FieldKind::Number => "NUMBER",
            },
            "OBJECT",
            false,
        )
    }

    fn render(
        &self,
        type_name: impl Fn(FieldKind) -> &'static str,
        object: &str,
        closed: bool,
    ) -> Value {
        let mut properties = Map::new();
        for field in self.fields {
            properties.insert(
                field.name.to_string(),
                json!({ "type": type_name(field.kind), "description": field.description }),
            );
        }
        let required: Vec<&str> = self.fields.iter().map(|f| f.name).collect();
        let mut schema = json!({
            "type": object,
            "properties": properties,
            "required": required,
        });
        if closed {
            schema["additionalProperties"] = Value::Bool(false);
        }
        schema
    }
}

/// Transport to a hosted model that can answer in structured JSON.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Provider label (`"gemini"`, `"openai"`, `"disabled"`).
    fn provider(&self) -> &str;

    /// Model identifier (e.g. `"gemini-2.0-flash"`).
    fn model_name(&self) -> &str;

    /// Send `prompt` once, asking for a reply shaped like `schema`, and
    /// return the reply text untouched.
    async fn complete(&self, prompt: &str, schema: &OutputSchema) -> Result<String>;
}

/// A backend that refuses every request.
pub struct DisabledBackend;

#[async_trait]
impl CompletionBackend for DisabledBackend {
    fn provider(&self) -> &str {
        "disabled"
    }

    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str, _schema: &OutputSchema) -> Result<String> {
        bail!("AI provider is disabled; set [ai].provider in the config file")
    }
}

/// Create the backend named by `ai.provider`.
///
/// | Config Value | Backend |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledBackend`] |
/// | `"gemini"` | [`GeminiBackend`] |
/// | `"openai"` | [`OpenAiBackend`] |
///
/// # Errors
///
/// Returns an error for unknown providers or when the API key variable
/// named by [`AiConfig::key_env`] is unset.
pub fn create_backend(config: &AiConfig) -> Result<Arc<dyn CompletionBackend>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledBackend)),
        "gemini" => Ok(Arc::new(GeminiBackend::from_config(config)?)),
        "openai" => Ok(Arc::new(OpenAiBackend::from_config(config)?)),
        other => bail!("Unknown AI provider: {}", other),
    }
}

pub(crate) fn read_api_key(config: &AiConfig) -> Result<String> {
    let var = config.key_env();
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("{} environment variable not set", var),
    }
}

/// Decode a model reply, failing closed.
///
/// Strips one surrounding Markdown code fence, parses JSON, then checks
/// that every schema field is present with the declared type before
/// deserializing. A reply that fails any check yields no value at all.
pub fn decode_reply<T: DeserializeOwned>(raw: &str, schema: &OutputSchema) -> Result<T> {
    let text = strip_code_fence(raw);
    if text.is_empty() {
        bail!("service returned an empty reply");
    }
    let value: Value = serde_json::from_str(text).context("reply is not valid JSON")?;
    let object = value
        .as_object()
        .ok_or_else(|| anyhow!("reply is not a JSON object"))?;

    for field in schema.fields {
        let v = object
            .get(field.name)
            .ok_or_else(|| anyhow!("reply is missing field `{}`", field.name))?;
        let ok = match field.kind {
            FieldKind::String => v.is_string(),
            FieldKind::Number => v.as_f64().is_some_and(f64::is_finite),
        };
        if !ok {
            let expected = match field.kind {
                FieldKind::String => "a string",
                FieldKind::Number => "a number",
            };
            bail!("reply field `{}` must be {}", field.name, expected);
        }
    }

    serde_json::from_value(value).context("reply does not match the expected shape")
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop an info string such as `json` on the opening fence line.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// First 200 characters of an error body, for messages.
pub(crate) fn snippet(body: &str) -> String {
    let s: String = body.chars().take(200).collect();
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    const PAIR: OutputSchema = OutputSchema {
        name: "pair",
        fields: &[
            Field {
                name: "label",
                kind: FieldKind::String,
                description: "A label.",
            },
            Field {
                name: "value",
                kind: FieldKind::Number,
                description: "A value.",
            },
        ],
    };

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pair {
        label: String,
        value: f64,
    }

    #[test]
    fn decodes_plain_json() {
        let pair: Pair = decode_reply(r#"{"label":"a","value":2.5}"#, &PAIR).unwrap();
        assert_eq!(
            pair,
            Pair {
                label: "a".into(),
                value: 2.5
            }
        );
    }

    #[test]
    fn decodes_fenced_json() {
        let raw = "```json\n{\"label\":\"a\",\"value\":1}\n```";
        let pair: Pair = decode_reply(raw, &PAIR).unwrap();
        assert_eq!(pair.value, 1.0);
    }

    #[test]
    fn rejects_missing_field() {
        let err = decode_reply::<Pair>(r#"{"label":"a"}"#, &PAIR).unwrap_err();
        assert!(err.to_string().contains("missing field `value`"));
    }

    #[test]
    fn rejects_number_as_string() {
        let err = decode_reply::<Pair>(r#"{"label":"a","value":"5"}"#, &PAIR).unwrap_err();
        assert!(err.to_string().contains("`value` must be a number"));
    }

    #[test]
    fn rejects_prose_and_empty() {
        assert!(decode_reply::<Pair>("Sure! Here is the data.", &PAIR).is_err());
        assert!(decode_reply::<Pair>("   ", &PAIR).is_err());
        assert!(decode_reply::<Pair>("[1,2]", &PAIR).is_err());
    }

    #[test]
    fn schema_dialects() {
        let openai = PAIR.to_json_schema();
        assert_eq!(openai["type"], "object");
        assert_eq!(openai["properties"]["value"]["type"], "number");
        assert_eq!(openai["additionalProperties"], false);
        assert_eq!(openai["required"], json!(["label", "value"]));

        let gemini = PAIR.to_openapi_schema();
        assert_eq!(gemini["type"], "OBJECT");
        assert_eq!(gemini["properties"]["label"]["type"], "STRING");
        assert!(gemini.get("additionalProperties").is_none());
    }

    #[tokio::test]
    async fn disabled_backend_refuses() {
        let err = DisabledBackend.complete("hi", &PAIR).await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }
}
