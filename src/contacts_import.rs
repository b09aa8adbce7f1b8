//! Address-book import.
//!
//! Reads a JSON array of dealer contacts. Each entry is either the ledger's
//! own shape or what the browser Contact Picker API returns:
//!
//! ```json
//! [
//!   { "name": "Dealer B", "contactInfo": "555-123-4567" },
//!   { "name": ["Perfume Dealer A"], "tel": [], "email": ["contact@dealera.com"] }
//! ]
//! ```
//!
//! Picker entries use the first name and the first phone number, falling
//! back to the first email. Entries that match neither shape are an error
//! for the whole file; entries with blank fields are passed through and
//! counted as invalid by the ledger.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use talctrack_core::models::NewDealerContact;

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    #[serde(rename_all = "camelCase")]
    Plain { name: String, contact_info: String },
    Picker {
        #[serde(default)]
        name: Vec<String>,
        #[serde(default)]
        tel: Vec<String>,
        #[serde(default)]
        email: Vec<String>,
    },
}

impl From<Entry> for NewDealerContact {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Plain { name, contact_info } => NewDealerContact::new(name, contact_info),
            Entry::Picker { name, tel, email } => {
                let first = |list: Vec<String>| {
                    list.into_iter()
                        .map(|s| s.trim().to_string())
                        .find(|s| !s.is_empty())
                };
                NewDealerContact::new(
                    first(name).unwrap_or_default(),
                    first(tel).or_else(|| first(email)).unwrap_or_default(),
                )
            }
        }
    }
}

pub fn parse_contacts(json: &str) -> Result<Vec<NewDealerContact>> {
    let entries: Vec<Entry> =
        serde_json::from_str(json).context("contacts file must be a JSON array of contacts")?;
    Ok(entries.into_iter().map(NewDealerContact::from).collect())
}

pub fn read_contacts(path: &Path) -> Result<Vec<NewDealerContact>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read contacts file: {}", path.display()))?;
    parse_contacts(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_shapes() {
        let contacts = parse_contacts(
            r#"[
                {"name": "Dealer B", "contactInfo": "555-123-4567"},
                {"name": ["Perfume Dealer A"], "tel": [], "email": ["contact@dealera.com"]},
                {"name": ["Dealer C", "C Ltd"], "tel": ["  ", "555-0000"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            contacts,
            vec![
                NewDealerContact::new("Dealer B", "555-123-4567"),
                NewDealerContact::new("Perfume Dealer A", "contact@dealera.com"),
                NewDealerContact::new("Dealer C", "555-0000"),
            ]
        );
    }

    #[test]
    fn picker_entry_without_details_is_blank() {
        let contacts = parse_contacts(r#"[{"name": ["Nobody"]}]"#).unwrap();
        assert_eq!(contacts[0].contact_info, "");
    }

    #[test]
    fn rejects_non_array() {
        assert!(parse_contacts(r#"{"name": "x"}"#).is_err());
        assert!(parse_contacts(r#"[42]"#).is_err());
    }
}
