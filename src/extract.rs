//! Purchase-notes extraction.
//!
//! Turns free-text purchase notes into a [`PurchaseAnalysis`] by delegating
//! all interpretation to the completion backend under a fixed schema. There
//! is no local parsing: the notes go out once, and the reply either decodes
//! into all five fields or the call fails.

use talctrack_core::error::ValidationError;
use talctrack_core::models::PurchaseAnalysis;

use crate::ai::{decode_reply, CompletionBackend, Field, FieldKind, OutputSchema};
use crate::error::{one_line, TalcError};

/// Output contract of the extraction service.
pub const PURCHASE_ANALYSIS: OutputSchema = OutputSchema {
    name: "purchase_analysis",
    fields: &[
        Field {
            name: "summary",
            kind: FieldKind::String,
            description: "A summary of the purchase.",
        },
        Field {
            name: "category",
            kind: FieldKind::String,
            description: "The category of the purchased items.",
        },
        Field {
            name: "quantity",
            kind: FieldKind::Number,
            description: "The quantity of the purchased items.",
        },
        Field {
            name: "price",
            kind: FieldKind::Number,
            description: "The price of the purchased items.",
        },
        Field {
            name: "dealerContactInfo",
            kind: FieldKind::String,
            description: "The contact information of the dealer.",
        },
    ],
};

fn render_prompt(notes: &str) -> String {
    format!(
        "You are an expert business analyst specializing in purchase analysis.\n\n\
         You will use these notes to extract key information about the purchase, \
         including a summary, category, quantity, price and dealer contact information.\n\n\
         Notes: {}",
        notes
    )
}

/// Analyze purchase notes with exactly one backend request.
///
/// # Errors
///
/// - [`TalcError::Validation`] if `notes` is blank; no request is sent.
/// - [`TalcError::Extraction`] if the request fails or the reply does not
///   conform to [`PURCHASE_ANALYSIS`].
pub async fn analyze_purchase_notes(
    backend: &dyn CompletionBackend,
    notes: &str,
) -> Result<PurchaseAnalysis, TalcError> {
    let notes = notes.trim();
    if notes.is_empty() {
        return Err(ValidationError::new("notes", "Purchase notes cannot be empty.").into());
    }

    let raw = backend
        .complete(&render_prompt(notes), &PURCHASE_ANALYSIS)
        .await
        .map_err(|e| {
            tracing::warn!(provider = backend.provider(), error = %e, "purchase analysis request failed");
            TalcError::Extraction(one_line(&e))
        })?;

    decode_reply(&raw, &PURCHASE_ANALYSIS).map_err(|e| {
        tracing::warn!(provider = backend.provider(), error = %e, "purchase analysis reply rejected");
        TalcError::Extraction(one_line(&e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with a canned body and counts requests.
    struct Canned {
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn ok(reply: &'static str) -> Self {
            Self {
                reply: Some(reply),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for Canned {
        fn provider(&self) -> &str {
            "canned"
        }
        fn model_name(&self) -> &str {
            "canned"
        }
        async fn complete(&self, prompt: &str, schema: &OutputSchema) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(schema.name, "purchase_analysis");
            assert!(prompt.contains("Notes: "));
            match self.reply {
                Some(reply) => Ok(reply.to_string()),
                None => bail!("connection reset by peer"),
            }
        }
    }

    #[tokio::test]
    async fn talc_notes_conform_to_schema() {
        let backend = Canned::ok(
            r#"{"summary":"100kg of talc from Dealer B","category":"Raw materials",
                "quantity":100,"price":500,"dealerContactInfo":"Dealer B, 555-123-4567"}"#,
        );
        let analysis = analyze_purchase_notes(
            &backend,
            "Bought 100kg talc for $500 from Dealer B, contact 555-123-4567",
        )
        .await
        .unwrap();
        assert!((analysis.quantity - 100.0).abs() < 1e-9);
        assert!((analysis.price - 500.0).abs() < 1e-9);
        assert!(analysis.dealer_contact_info.contains("555-123-4567"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_notes_never_reach_the_backend() {
        let backend = Canned::ok("{}");
        let err = analyze_purchase_notes(&backend, "   ").await.unwrap_err();
        assert!(matches!(err, TalcError::Validation(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn partial_reply_is_rejected() {
        let backend = Canned::ok(r#"{"summary":"talc","category":"Raw","quantity":100}"#);
        let err = analyze_purchase_notes(&backend, "talc").await.unwrap_err();
        match err {
            TalcError::Extraction(msg) => assert!(msg.contains("price")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_an_extraction_error_without_retry() {
        let backend = Canned::failing();
        let err = analyze_purchase_notes(&backend, "talc").await.unwrap_err();
        assert!(matches!(err, TalcError::Extraction(ref m) if m.contains("connection reset")));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }
}
