//! Ledger records.
//!
//! The same types are used in memory and on the wire: field names serialize
//! in camelCase to match the shared remote document.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{require_text, ValidationError};

/// Generate a fresh record id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Parse a user-entered due date (`YYYY-MM-DD` or an RFC 3339 timestamp).
pub fn parse_due_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::new("dueDate", "Due date is required."));
    }
    crate::snapshot::iso_date::parse(raw)
        .ok_or_else(|| ValidationError::new("dueDate", "Due date must be a date (YYYY-MM-DD)."))
}

/// Money owed to the business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receivable {
    pub id: String,
    pub payer: String,
    pub amount: f64,
}

/// Money the business owes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payable {
    pub id: String,
    pub payee: String,
    pub amount: f64,
    #[serde(with = "crate::snapshot::iso_date")]
    pub due_date: NaiveDate,
}

/// A logged purchase. Everything except `notes` is optional because
/// purchases can be recorded without running the notes through analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dealer_contact_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerContact {
    pub id: String,
    pub name: String,
    pub contact_info: String,
}

/// Structured fields extracted from free-text purchase notes.
///
/// Every field is required; a reply missing any of them is rejected
/// rather than turned into a partial record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseAnalysis {
    pub summary: String,
    pub category: String,
    pub quantity: f64,
    pub price: f64,
    pub dealer_contact_info: String,
}

/// Purchase fields gathered before an id is assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDraft {
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub dealer_contact_info: Option<String>,
}

impl PurchaseDraft {
    pub fn new(notes: impl Into<String>) -> Self {
        Self {
            notes: notes.into(),
            ..Self::default()
        }
    }

    /// Draft carrying the original notes plus every analyzed field.
    pub fn from_analysis(notes: impl Into<String>, analysis: PurchaseAnalysis) -> Self {
        Self {
            notes: notes.into(),
            summary: Some(analysis.summary),
            category: Some(analysis.category),
            quantity: Some(analysis.quantity),
            price: Some(analysis.price),
            dealer_contact_info: Some(analysis.dealer_contact_info),
        }
    }

    /// Validate and assign a fresh id.
    pub fn into_purchase(self) -> Result<Purchase, ValidationError> {
        let notes = require_text("notes", &self.notes, "Purchase notes cannot be empty.")?;
        for (field, value) in [("quantity", self.quantity), ("price", self.price)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ValidationError::new(field, format!("{} must be a number", field)));
            }
        }
        Ok(Purchase {
            id: new_id(),
            notes,
            summary: non_blank(self.summary),
            category: non_blank(self.category),
            quantity: self.quantity,
            price: self.price,
            dealer_contact_info: non_blank(self.dealer_contact_info),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A dealer contact candidate, as entered by hand or read from an
/// address-book export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDealerContact {
    pub name: String,
    pub contact_info: String,
}

impl NewDealerContact {
    pub fn new(name: impl Into<String>, contact_info: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contact_info: contact_info.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(String, String), ValidationError> {
        let name = require_text("name", &self.name, "Dealer name is required")?;
        let contact_info = require_text(
            "contactInfo",
            &self.contact_info,
            "Contact info is required",
        )?;
        Ok((name, contact_info))
    }
}
