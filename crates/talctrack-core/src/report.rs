//! Read-only views over the ledger: balance totals and the three text
//! blobs sent to the summary service.

use serde::{Deserialize, Serialize};

use crate::snapshot::LedgerSnapshot;

/// Placeholder sent for an empty collection.
pub const EMPTY_BLOB: &str = "None";

/// Active balances. Cleared history is not counted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Overview {
    pub total_receivables: f64,
    pub total_payables: f64,
    pub net_balance: f64,
}

/// Request body of the summary service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryInput {
    pub receivables: String,
    pub payables: String,
    pub purchases: String,
}

pub fn overview(state: &LedgerSnapshot) -> Overview {
    let total_receivables: f64 = state.receivables.iter().map(|r| r.amount).sum();
    let total_payables: f64 = state.payables.iter().map(|p| p.amount).sum();
    Overview {
        total_receivables,
        total_payables,
        net_balance: total_receivables - total_payables,
    }
}

/// `"Bob: $100, Jane: $200"` style blobs, `"None"` for empty collections.
pub fn summary_input(state: &LedgerSnapshot) -> SummaryInput {
    let receivables: Vec<String> = state
        .receivables
        .iter()
        .map(|r| format!("{}: ${}", r.payer, r.amount))
        .collect();
    let payables: Vec<String> = state
        .payables
        .iter()
        .map(|p| format!("{}: ${}", p.payee, p.amount))
        .collect();
    let purchases: Vec<&str> = state.purchases.iter().map(|p| p.notes.as_str()).collect();

    SummaryInput {
        receivables: or_none(receivables.join(", ")),
        payables: or_none(payables.join(", ")),
        purchases: or_none(purchases.join("; ")),
    }
}

fn or_none(joined: String) -> String {
    if joined.is_empty() {
        EMPTY_BLOB.to_string()
    } else {
        joined
    }
}

/// `$1234.50` style money rendering used by the CLI.
pub fn format_money(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", -amount)
    } else {
        format!("${:.2}", amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Payable, Purchase, Receivable};
    use chrono::NaiveDate;

    fn receivable(payer: &str, amount: f64) -> Receivable {
        Receivable {
            id: payer.to_lowercase(),
            payer: payer.into(),
            amount,
        }
    }

    #[test]
    fn empty_ledger_blobs_are_none() {
        let input = summary_input(&LedgerSnapshot::default());
        assert_eq!(input.receivables, "None");
        assert_eq!(input.payables, "None");
        assert_eq!(input.purchases, "None");
    }

    #[test]
    fn blobs_join_records() {
        let mut state = LedgerSnapshot::default();
        state.receivables = vec![receivable("Bob", 100.0), receivable("Jane", 200.5)];
        state.payables = vec![Payable {
            id: "p".into(),
            payee: "Acme Corp".into(),
            amount: 500.0,
            due_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }];
        state.purchases = vec![
            Purchase {
                id: "2".into(),
                notes: "talc 50kg".into(),
                summary: None,
                category: None,
                quantity: None,
                price: None,
                dealer_contact_info: None,
            },
            Purchase {
                id: "1".into(),
                notes: "bags".into(),
                summary: None,
                category: None,
                quantity: None,
                price: None,
                dealer_contact_info: None,
            },
        ];

        let input = summary_input(&state);
        assert_eq!(input.receivables, "Bob: $100, Jane: $200.5");
        assert_eq!(input.payables, "Acme Corp: $500");
        assert_eq!(input.purchases, "talc 50kg; bags");
    }

    #[test]
    fn overview_nets_payables_against_receivables() {
        let mut state = LedgerSnapshot::default();
        state.receivables = vec![receivable("A", 1500.0), receivable("B", 800.0)];
        state.historical_receivables = vec![receivable("Old", 9999.0)];
        state.payables = vec![Payable {
            id: "x".into(),
            payee: "X".into(),
            amount: 3000.0,
            due_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }];
        let o = overview(&state);
        assert_eq!(o.total_receivables, 2300.0);
        assert_eq!(o.total_payables, 3000.0);
        assert_eq!(o.net_balance, -700.0);
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(1500.0), "$1500.00");
        assert_eq!(format_money(-700.0), "-$700.00");
        assert_eq!(format_money(0.126), "$0.13");
    }
}
