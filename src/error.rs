//! User-facing error taxonomy.
//!
//! Every intent ends in either a success notification or exactly one of
//! these. Internal plumbing uses `anyhow`; adapters fold those errors into
//! a variant here at their boundary, keeping only a one-line message.

use thiserror::Error;

use talctrack_core::error::{LedgerError, ValidationError};

#[derive(Debug, Error)]
pub enum TalcError {
    /// Malformed or missing input, caught before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The initial remote snapshot has not arrived.
    #[error("Ledger is still loading. Try again once the initial sync completes.")]
    Loading,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The extraction service failed or replied with a non-conforming shape.
    #[error("Failed to analyze purchase notes: {0}")]
    Extraction(String),

    /// The summary service failed or replied with a non-conforming shape.
    #[error("Failed to generate summary: {0}")]
    Summary(String),

    /// The remote store subscription failed or never delivered a snapshot.
    #[error("Failed to load ledger: {0}")]
    SyncRead(String),

    /// Replacing the remote document failed. Local state is kept.
    #[error("Failed to save ledger: {0}")]
    SyncWrite(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<LedgerError> for TalcError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(v) => TalcError::Validation(v),
            LedgerError::Loading => TalcError::Loading,
        }
    }
}

impl TalcError {
    /// Machine-readable code used by the HTTP API.
    pub fn code(&self) -> &'static str {
        match self {
            TalcError::Validation(_) => "validation",
            TalcError::Loading => "loading",
            TalcError::NotFound { .. } => "not_found",
            TalcError::Extraction(_) => "extraction_failed",
            TalcError::Summary(_) => "summary_failed",
            TalcError::SyncRead(_) | TalcError::SyncWrite(_) => "sync_failed",
            TalcError::Config(_) => "config",
        }
    }
}

/// Collapse an `anyhow` chain into one line (`outer: inner: root`).
pub(crate) fn one_line(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_onto_taxonomy() {
        let err: TalcError = LedgerError::Loading.into();
        assert!(matches!(err, TalcError::Loading));

        let err: TalcError =
            LedgerError::Validation(ValidationError::new("payer", "Payer name is required")).into();
        assert_eq!(err.code(), "validation");
        assert_eq!(err.to_string(), "Payer name is required");
    }

    #[test]
    fn one_line_joins_context() {
        let err = anyhow::anyhow!("connection refused").context("PUT /ledger.json");
        assert_eq!(one_line(&err), "PUT /ledger.json: connection refused");
    }
}
