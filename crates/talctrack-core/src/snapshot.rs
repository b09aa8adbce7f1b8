//! Remote document codec.
//!
//! The whole ledger is mirrored as one JSON tree:
//!
//! ```json
//! {
//!   "receivables": [{ "id": "…", "payer": "Bob", "amount": 100 }],
//!   "payables": [{ "id": "…", "payee": "Acme", "amount": 50, "dueDate": "2024-07-01" }],
//!   "purchases": [],
//!   "dealerContacts": [],
//!   "historicalReceivables": [],
//!   "historicalPayables": []
//! }
//! ```
//!
//! Realtime databases drop empty arrays and may hand back sparse arrays as
//! objects keyed by index, so every collection decodes from a missing key,
//! `null`, an array, or an index-keyed object.

use anyhow::{Context, Result};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::{DealerContact, Payable, Purchase, Receivable};

/// Serialized mirror of every ledger collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    #[serde(default, deserialize_with = "collection")]
    pub receivables: Vec<Receivable>,
    #[serde(default, deserialize_with = "collection")]
    pub payables: Vec<Payable>,
    #[serde(default, deserialize_with = "collection")]
    pub purchases: Vec<Purchase>,
    #[serde(default, deserialize_with = "collection")]
    pub dealer_contacts: Vec<DealerContact>,
    #[serde(default, deserialize_with = "collection")]
    pub historical_receivables: Vec<Receivable>,
    #[serde(default, deserialize_with = "collection")]
    pub historical_payables: Vec<Payable>,
}

impl LedgerSnapshot {
    /// Decode a document as read from the remote store. `null` is the
    /// empty ledger.
    pub fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).context("remote document does not match the ledger shape")
    }

    /// Encode for a whole-tree write.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).context("failed to encode ledger snapshot")
    }

    /// Hex SHA-256 of the canonical encoding. Two snapshots with equal
    /// contents always share a digest.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.receivables.is_empty()
            && self.payables.is_empty()
            && self.purchases.is_empty()
            && self.dealer_contacts.is_empty()
            && self.historical_receivables.is_empty()
            && self.historical_payables.is_empty()
    }
}

fn collection<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items: Vec<Value> = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(Value::Object(map)) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| match (a.parse::<u64>(), b.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => a.cmp(b),
            });
            entries.into_iter().map(|(_, v)| v).collect()
        }
        Some(other) => {
            return Err(D::Error::custom(format!(
                "expected a list of records, found {}",
                other
            )))
        }
    };

    items
        .into_iter()
        .filter(|v| !v.is_null())
        .map(|v| serde_json::from_value(v).map_err(D::Error::custom))
        .collect()
}

/// ISO-8601 calendar dates.
///
/// Writes `YYYY-MM-DD`. Reads that form or a full RFC 3339 timestamp
/// (taking the UTC calendar day), which is how browser clients store
/// `Date` values.
pub mod iso_date {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid ISO-8601 date: {}", raw)))
    }

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(date);
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    }
}
