//! Errors raised by ledger transitions.

use thiserror::Error;

/// Malformed or missing required input, caught before any state change
/// or network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Name of the offending input field (`payer`, `amount`, `notes`, ...).
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Why a [`Ledger`](crate::ledger::Ledger) transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The initial remote snapshot has not been applied yet.
    #[error("ledger is still loading")]
    Loading,
}

/// Trim `value` and reject it when nothing is left.
pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    message: &str,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, message));
    }
    Ok(trimmed.to_string())
}

/// Reject non-finite and non-positive amounts.
pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::new(
            field,
            "Amount must be a positive number",
        ));
    }
    Ok(value)
}
