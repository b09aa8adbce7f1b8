//! Financial summary generation.
//!
//! Sends the three ledger blobs built by
//! [`report::summary_input`](talctrack_core::report::summary_input) to the
//! completion backend and returns its prose. Read-only: the ledger is never
//! touched here.

use serde::Deserialize;
use talctrack_core::error::ValidationError;
use talctrack_core::report::SummaryInput;

use crate::ai::{decode_reply, CompletionBackend, Field, FieldKind, OutputSchema};
use crate::error::{one_line, TalcError};

/// Output contract of the summary service.
pub const FINANCIAL_SUMMARY: OutputSchema = OutputSchema {
    name: "financial_summary",
    fields: &[Field {
        name: "summary",
        kind: FieldKind::String,
        description: "A summary of your financial status, risks, and action items.",
    }],
};

#[derive(Deserialize)]
struct FinancialSummary {
    summary: String,
}

fn render_prompt(input: &SummaryInput) -> String {
    format!(
        "You are a financial advisor providing a summary of a business's financial status.\n\n\
         Provide a concise summary of the financial status, key risks, and action items \
         based on the following information:\n\n\
         Receivables: {}\n\
         Payables: {}\n\
         Purchases: {}\n",
        input.receivables, input.payables, input.purchases
    )
}

/// Generate a summary with exactly one backend request.
///
/// # Errors
///
/// - [`TalcError::Validation`] if any blob is blank (empty collections are
///   sent as `"None"`, never as empty text).
/// - [`TalcError::Summary`] if the request fails, the reply does not
///   conform to [`FINANCIAL_SUMMARY`], or the summary is empty.
pub async fn financial_summary(
    backend: &dyn CompletionBackend,
    input: &SummaryInput,
) -> Result<String, TalcError> {
    for (field, blob) in [
        ("receivables", &input.receivables),
        ("payables", &input.payables),
        ("purchases", &input.purchases),
    ] {
        if blob.trim().is_empty() {
            return Err(ValidationError::new(field, format!("{} must not be empty", field)).into());
        }
    }

    let raw = backend
        .complete(&render_prompt(input), &FINANCIAL_SUMMARY)
        .await
        .map_err(|e| {
            tracing::warn!(provider = backend.provider(), error = %e, "summary request failed");
            TalcError::Summary(one_line(&e))
        })?;

    let reply: FinancialSummary =
        decode_reply(&raw, &FINANCIAL_SUMMARY).map_err(|e| TalcError::Summary(one_line(&e)))?;

    let summary = reply.summary.trim();
    if summary.is_empty() {
        return Err(TalcError::Summary("service returned an empty summary".to_string()));
    }
    Ok(summary.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder {
        reply: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionBackend for Recorder {
        fn provider(&self) -> &str {
            "recorder"
        }
        fn model_name(&self) -> &str {
            "recorder"
        }
        async fn complete(&self, prompt: &str, _schema: &OutputSchema) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.to_string())
        }
    }

    fn none_input() -> SummaryInput {
        SummaryInput {
            receivables: "None".into(),
            payables: "None".into(),
            purchases: "None".into(),
        }
    }

    #[tokio::test]
    async fn all_none_still_yields_a_summary() {
        let backend = Recorder {
            reply: r#"{"summary":"No outstanding balances. Consider logging purchases."}"#,
            prompts: Mutex::new(Vec::new()),
        };
        let summary = financial_summary(&backend, &none_input()).await.unwrap();
        assert!(!summary.is_empty());

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Receivables: None"));
        assert!(prompts[0].contains("Purchases: None"));
    }

    #[tokio::test]
    async fn empty_summary_is_a_contract_violation() {
        let backend = Recorder {
            reply: r#"{"summary":"   "}"#,
            prompts: Mutex::new(Vec::new()),
        };
        let err = financial_summary(&backend, &none_input()).await.unwrap_err();
        assert!(matches!(err, TalcError::Summary(_)));
    }

    #[tokio::test]
    async fn blank_blob_is_rejected_before_sending() {
        let backend = Recorder {
            reply: r#"{"summary":"x"}"#,
            prompts: Mutex::new(Vec::new()),
        };
        let mut input = none_input();
        input.payables = String::new();
        let err = financial_summary(&backend, &input).await.unwrap_err();
        assert!(matches!(err, TalcError::Validation(ref v) if v.field == "payables"));
        assert!(backend.prompts.lock().unwrap().is_empty());
    }
}
