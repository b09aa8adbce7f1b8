//! The domain store.
//!
//! [`Ledger`] exclusively owns every collection. Each transition runs to
//! completion under `&mut self`, so a cleared record is observed either in
//! the active list or at the head of its history list, never both and
//! never neither.
//!
//! Writes to the remote mirror are driven by a revision counter: every
//! successful transition bumps `revision`, and a flush records the revision
//! it wrote. The ledger is dirty whenever the two differ.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{require_positive, require_text, LedgerError, ValidationError};
use crate::models::{
    new_id, DealerContact, NewDealerContact, Payable, Purchase, Receivable,
};
use crate::report::{self, Overview, SummaryInput};
use crate::snapshot::LedgerSnapshot;

/// Outcome of a bulk dealer-contact import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    state: LedgerSnapshot,
    loading: bool,
    revision: u64,
    flushed_revision: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// An empty, loaded ledger.
    pub fn new() -> Self {
        Self {
            state: LedgerSnapshot::default(),
            loading: false,
            revision: 0,
            flushed_revision: 0,
        }
    }

    /// A ledger waiting for its first remote snapshot. Every transition is
    /// refused with [`LedgerError::Loading`] until
    /// [`replace_from_snapshot`](Self::replace_from_snapshot) runs.
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::new()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_dirty(&self) -> bool {
        self.revision != self.flushed_revision
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> &LedgerSnapshot {
        &self.state
    }

    pub fn receivables(&self) -> &[Receivable] {
        &self.state.receivables
    }

    pub fn payables(&self) -> &[Payable] {
        &self.state.payables
    }

    pub fn purchases(&self) -> &[Purchase] {
        &self.state.purchases
    }

    pub fn dealer_contacts(&self) -> &[DealerContact] {
        &self.state.dealer_contacts
    }

    pub fn historical_receivables(&self) -> &[Receivable] {
        &self.state.historical_receivables
    }

    pub fn historical_payables(&self) -> &[Payable] {
        &self.state.historical_payables
    }

    /// Replace the whole state with a remote snapshot. Last snapshot wins:
    /// unflushed local transitions are discarded and the ledger is clean
    /// afterwards, so applying remote state never triggers a write-back.
    pub fn replace_from_snapshot(&mut self, snapshot: LedgerSnapshot) {
        self.state = snapshot;
        self.loading = false;
        self.flushed_revision = self.revision;
    }

    /// The full tree plus the revision it reflects, when there is
    /// something to write.
    pub fn pending_flush(&self) -> Option<(LedgerSnapshot, u64)> {
        if self.loading || !self.is_dirty() {
            return None;
        }
        Some((self.state.clone(), self.revision))
    }

    /// Record that `revision` reached the remote store. Transitions made
    /// after that revision keep the ledger dirty.
    pub fn mark_flushed(&mut self, revision: u64) {
        if revision > self.flushed_revision && revision <= self.revision {
            self.flushed_revision = revision;
        }
    }

    fn ensure_loaded(&self) -> Result<(), LedgerError> {
        if self.loading {
            return Err(LedgerError::Loading);
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn add_receivable(&mut self, payer: &str, amount: f64) -> Result<Receivable, LedgerError> {
        self.ensure_loaded()?;
        let receivable = Receivable {
            id: new_id(),
            payer: require_text("payer", payer, "Payer name is required")?,
            amount: require_positive("amount", amount)?,
        };
        self.state.receivables.push(receivable.clone());
        self.touch();
        Ok(receivable)
    }

    /// Move a receivable to the head of the history list. `Ok(None)` when
    /// no receivable has this id; nothing changes in that case.
    pub fn clear_receivable(&mut self, id: &str) -> Result<Option<Receivable>, LedgerError> {
        self.ensure_loaded()?;
        let Some(pos) = self.state.receivables.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let moved = self.state.receivables.remove(pos);
        self.state.historical_receivables.insert(0, moved.clone());
        self.touch();
        Ok(Some(moved))
    }

    pub fn add_payable(
        &mut self,
        payee: &str,
        amount: f64,
        due_date: NaiveDate,
    ) -> Result<Payable, LedgerError> {
        self.ensure_loaded()?;
        let payable = Payable {
            id: new_id(),
            payee: require_text("payee", payee, "Payee name is required")?,
            amount: require_positive("amount", amount)?,
            due_date,
        };
        self.state.payables.push(payable.clone());
        self.touch();
        Ok(payable)
    }

    pub fn clear_payable(&mut self, id: &str) -> Result<Option<Payable>, LedgerError> {
        self.ensure_loaded()?;
        let Some(pos) = self.state.payables.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let moved = self.state.payables.remove(pos);
        self.state.historical_payables.insert(0, moved.clone());
        self.touch();
        Ok(Some(moved))
    }

    /// Prepend a finished purchase. Analysis, if any, has already happened.
    pub fn add_purchase(&mut self, purchase: Purchase) -> Result<Purchase, LedgerError> {
        self.ensure_loaded()?;
        require_text("notes", &purchase.notes, "Purchase notes cannot be empty.")?;
        if self.state.purchases.iter().any(|p| p.id == purchase.id) {
            return Err(ValidationError::new(
                "id",
                format!("Purchase {} is already recorded.", purchase.id),
            )
            .into());
        }
        self.state.purchases.insert(0, purchase.clone());
        self.touch();
        Ok(purchase)
    }

    pub fn add_dealer_contact(
        &mut self,
        name: &str,
        contact_info: &str,
    ) -> Result<DealerContact, LedgerError> {
        self.ensure_loaded()?;
        let (name, contact_info) = NewDealerContact::new(name, contact_info).validate()?;
        let contact = DealerContact {
            id: new_id(),
            name,
            contact_info,
        };
        self.state.dealer_contacts.push(contact.clone());
        self.touch();
        Ok(contact)
    }

    /// Append every valid candidate whose (name, contact info) pair is not
    /// already present, in input order. Pairs repeated within the batch are
    /// imported once.
    pub fn import_dealer_contacts(
        &mut self,
        candidates: impl IntoIterator<Item = NewDealerContact>,
    ) -> Result<ImportReport, LedgerError> {
        self.ensure_loaded()?;
        let mut report = ImportReport::default();
        for candidate in candidates {
            let Ok((name, contact_info)) = candidate.validate() else {
                report.invalid += 1;
                continue;
            };
            let exists = self
                .state
                .dealer_contacts
                .iter()
                .any(|c| c.name == name && c.contact_info == contact_info);
            if exists {
                report.duplicates += 1;
                continue;
            }
            self.state.dealer_contacts.push(DealerContact {
                id: new_id(),
                name,
                contact_info,
            });
            report.imported += 1;
        }
        if report.imported > 0 {
            self.touch();
        }
        Ok(report)
    }

    pub fn overview(&self) -> Overview {
        report::overview(&self.state)
    }

    pub fn summary_input(&self) -> SummaryInput {
        report::summary_input(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PurchaseDraft;
    use std::collections::HashSet;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn bob_and_jane_total_300() {
        let mut ledger = Ledger::new();
        ledger.add_receivable("Bob", 100.0).unwrap();
        ledger.add_receivable("Jane", 200.0).unwrap();

        let got: Vec<(&str, f64)> = ledger
            .receivables()
            .iter()
            .map(|r| (r.payer.as_str(), r.amount))
            .collect();
        assert_eq!(got, vec![("Bob", 100.0), ("Jane", 200.0)]);
        assert_eq!(ledger.overview().total_receivables, 300.0);
    }

    #[test]
    fn adds_grow_by_one_with_unique_ids() {
        let mut ledger = Ledger::new();
        for i in 0..20 {
            let before = ledger.receivables().len();
            ledger.add_receivable("Payer", 1.0 + i as f64).unwrap();
            assert_eq!(ledger.receivables().len(), before + 1);
        }
        let ids: HashSet<&str> = ledger.receivables().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn invalid_receivable_changes_nothing() {
        let mut ledger = Ledger::new();
        let err = ledger.add_receivable("", 10.0).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ref v) if v.field == "payer"));
        let err = ledger.add_receivable("Bob", 0.0).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ref v) if v.field == "amount"));
        assert!(ledger.receivables().is_empty());
        assert!(!ledger.is_dirty());
    }

    #[test]
    fn clear_receivable_moves_exact_record_to_history_head() {
        let mut ledger = Ledger::new();
        let first = ledger.add_receivable("Customer A", 1500.0).unwrap();
        let second = ledger.add_receivable("Customer B", 800.0).unwrap();
        ledger.clear_receivable(&first.id).unwrap();

        let moved = ledger.clear_receivable(&second.id).unwrap().unwrap();
        assert_eq!(moved, second);
        assert!(ledger.receivables().is_empty());
        assert_eq!(ledger.historical_receivables()[0], second);
        assert_eq!(ledger.historical_receivables()[1], first);
    }

    #[test]
    fn clear_missing_id_is_a_silent_noop() {
        let mut ledger = Ledger::new();
        ledger.add_payable("Supplier X", 2000.0, day(2024, 1, 1)).unwrap();
        let (_, rev) = ledger.pending_flush().unwrap();
        ledger.mark_flushed(rev);
        let before = ledger.snapshot().clone();

        assert_eq!(ledger.clear_payable("nope").unwrap(), None);
        assert_eq!(ledger.clear_receivable("nope").unwrap(), None);
        assert_eq!(ledger.snapshot(), &before);
        assert!(!ledger.is_dirty());
    }

    #[test]
    fn clear_payable_preserves_due_date() {
        let mut ledger = Ledger::new();
        let payable = ledger.add_payable("Acme", 500.0, day(2024, 6, 30)).unwrap();
        let moved = ledger.clear_payable(&payable.id).unwrap().unwrap();
        assert_eq!(moved.due_date, day(2024, 6, 30));
        assert_eq!(ledger.historical_payables(), &[payable]);
        assert!(ledger.payables().is_empty());
    }

    #[test]
    fn purchases_are_newest_first() {
        let mut ledger = Ledger::new();
        let a = PurchaseDraft::new("first").into_purchase().unwrap();
        let b = PurchaseDraft::new("second").into_purchase().unwrap();
        ledger.add_purchase(a).unwrap();
        ledger.add_purchase(b).unwrap();
        let notes: Vec<&str> = ledger.purchases().iter().map(|p| p.notes.as_str()).collect();
        assert_eq!(notes, vec!["second", "first"]);
    }

    #[test]
    fn purchase_with_known_id_is_refused() {
        let mut ledger = Ledger::new();
        let purchase = PurchaseDraft::new("100kg talc").into_purchase().unwrap();
        ledger.add_purchase(purchase.clone()).unwrap();
        let rev = ledger.revision();

        let err = ledger.add_purchase(purchase).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ref v) if v.field == "id"));
        assert_eq!(ledger.purchases().len(), 1);
        assert_eq!(ledger.revision(), rev);
    }

    #[test]
    fn import_skips_existing_pairs() {
        let mut ledger = Ledger::new();
        ledger.add_dealer_contact("Dealer A", "a@x.com").unwrap();
        ledger.add_dealer_contact("Dealer B", "555-0100").unwrap();
        let rev = ledger.revision();

        let report = ledger
            .import_dealer_contacts(vec![
                NewDealerContact::new("Dealer A", "a@x.com"),
                NewDealerContact::new(" Dealer B ", "555-0100"),
            ])
            .unwrap();
        assert_eq!(report.imported, 0);
        assert_eq!(report.duplicates, 2);
        assert_eq!(ledger.dealer_contacts().len(), 2);
        assert_eq!(ledger.revision(), rev);
    }

    #[test]
    fn import_adds_disjoint_contacts() {
        let mut ledger = Ledger::new();
        ledger.add_dealer_contact("Dealer A", "a@x.com").unwrap();
        let batch: Vec<NewDealerContact> = (0..5)
            .map(|i| NewDealerContact::new(format!("Dealer {}", i), format!("555-010{}", i)))
            .collect();
        let report = ledger.import_dealer_contacts(batch).unwrap();
        assert_eq!(report.imported, 5);
        assert_eq!(ledger.dealer_contacts().len(), 6);
        assert_eq!(ledger.dealer_contacts()[1].name, "Dealer 0");
    }

    #[test]
    fn import_dedups_within_batch_and_counts_invalid() {
        let mut ledger = Ledger::new();
        let report = ledger
            .import_dealer_contacts(vec![
                NewDealerContact::new("Dealer C", "c@x.com"),
                NewDealerContact::new("Dealer C", "c@x.com"),
                NewDealerContact::new("", "nobody@x.com"),
            ])
            .unwrap();
        assert_eq!(
            report,
            ImportReport {
                imported: 1,
                duplicates: 1,
                invalid: 1
            }
        );
    }

    #[test]
    fn loading_ledger_refuses_transitions() {
        let mut ledger = Ledger::loading();
        assert_eq!(ledger.add_receivable("Bob", 1.0), Err(LedgerError::Loading));
        assert_eq!(ledger.clear_payable("x"), Err(LedgerError::Loading));
        assert!(ledger.pending_flush().is_none());

        ledger.replace_from_snapshot(LedgerSnapshot::default());
        assert!(!ledger.is_loading());
        assert!(ledger.add_receivable("Bob", 1.0).is_ok());
    }

    #[test]
    fn remote_snapshot_never_marks_dirty() {
        let mut ledger = Ledger::new();
        ledger.add_receivable("Bob", 1.0).unwrap();
        assert!(ledger.is_dirty());

        let mut remote = LedgerSnapshot::default();
        remote.receivables.push(Receivable {
            id: "remote".into(),
            payer: "Remote".into(),
            amount: 9.0,
        });
        ledger.replace_from_snapshot(remote.clone());
        assert!(!ledger.is_dirty());
        assert_eq!(ledger.snapshot(), &remote);
    }

    #[test]
    fn mark_flushed_keeps_later_transitions_dirty() {
        let mut ledger = Ledger::new();
        ledger.add_receivable("Bob", 1.0).unwrap();
        let (_, rev) = ledger.pending_flush().unwrap();
        ledger.add_receivable("Jane", 2.0).unwrap();
        ledger.mark_flushed(rev);
        assert!(ledger.is_dirty());

        let (snapshot, rev) = ledger.pending_flush().unwrap();
        assert_eq!(snapshot.receivables.len(), 2);
        ledger.mark_flushed(rev);
        assert!(!ledger.is_dirty());
        assert!(ledger.pending_flush().is_none());
    }
}
