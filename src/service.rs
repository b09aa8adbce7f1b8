//! User intents.
//!
//! [`LedgerService`] is what the CLI and the HTTP API call. Each mutating
//! intent applies one ledger transition, releases the lock, then flushes.
//! The outcome is a [`Notice`] carrying the one-line success message, or a
//! [`TalcError`].

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use talctrack_core::ledger::ImportReport;
use talctrack_core::models::{
    DealerContact, NewDealerContact, Payable, Purchase, PurchaseAnalysis, PurchaseDraft,
    Receivable,
};
use talctrack_core::report::Overview;
use talctrack_core::snapshot::LedgerSnapshot;

use crate::ai::CompletionBackend;
use crate::error::TalcError;
use crate::extract::analyze_purchase_notes;
use crate::summary::financial_summary;
use crate::sync::SyncSession;

/// A successful intent: the notification line plus the affected data.
#[derive(Debug, Clone, Serialize)]
pub struct Notice<T> {
    pub message: String,
    pub data: T,
}

impl<T> Notice<T> {
    fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerView {
    pub loading: bool,
    pub dirty: bool,
    #[serde(flatten)]
    pub ledger: LedgerSnapshot,
}

pub struct LedgerService {
    session: SyncSession,
    ai: Arc<dyn CompletionBackend>,
}

impl LedgerService {
    pub fn new(session: SyncSession, ai: Arc<dyn CompletionBackend>) -> Self {
        Self { session, ai }
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    pub fn ai_provider(&self) -> &str {
        self.ai.provider()
    }

    /// Release the subscription.
    pub async fn close(self) {
        self.session.close().await;
    }

    pub async fn view(&self) -> LedgerView {
        let ledger = self.session.ledger().await;
        LedgerView {
            loading: ledger.is_loading(),
            dirty: ledger.is_dirty(),
            ledger: ledger.snapshot().clone(),
        }
    }

    pub async fn overview(&self) -> Overview {
        self.session.ledger().await.overview()
    }

    pub async fn add_receivable(
        &self,
        payer: &str,
        amount: f64,
    ) -> Result<Notice<Receivable>, TalcError> {
        let added = self.session.ledger().await.add_receivable(payer, amount)?;
        self.session.flush().await?;
        Ok(Notice::new("Receivable added.", added))
    }

    pub async fn clear_receivable(&self, id: &str) -> Result<Notice<Receivable>, TalcError> {
        let cleared = self
            .session
            .ledger()
            .await
            .clear_receivable(id)?
            .ok_or_else(|| TalcError::NotFound {
                kind: "Receivable",
                id: id.to_string(),
            })?;
        self.session.flush().await?;
        Ok(Notice::new("Receivable cleared.", cleared))
    }

    pub async fn add_payable(
        &self,
        payee: &str,
        amount: f64,
        due_date: NaiveDate,
    ) -> Result<Notice<Payable>, TalcError> {
        let added = self
            .session
            .ledger()
            .await
            .add_payable(payee, amount, due_date)?;
        self.session.flush().await?;
        Ok(Notice::new("Payable added.", added))
    }

    pub async fn clear_payable(&self, id: &str) -> Result<Notice<Payable>, TalcError> {
        let cleared = self
            .session
            .ledger()
            .await
            .clear_payable(id)?
            .ok_or_else(|| TalcError::NotFound {
                kind: "Payable",
                id: id.to_string(),
            })?;
        self.session.flush().await?;
        Ok(Notice::new("Payable cleared.", cleared))
    }

    /// Run the extraction service without touching the ledger.
    pub async fn analyze(&self, notes: &str) -> Result<Notice<PurchaseAnalysis>, TalcError> {
        let analysis = analyze_purchase_notes(self.ai.as_ref(), notes).await?;
        Ok(Notice::new("Purchase notes analyzed.", analysis))
    }

    /// Add a purchase. With `analyze`, the notes go through the extraction
    /// service first and its fields replace any given in the draft; on
    /// extraction failure nothing is added.
    pub async fn add_purchase(
        &self,
        draft: PurchaseDraft,
        analyze: bool,
    ) -> Result<Notice<Purchase>, TalcError> {
        if self.session.ledger().await.is_loading() {
            return Err(TalcError::Loading);
        }

        let (draft, message) = if analyze {
            let analysis = analyze_purchase_notes(self.ai.as_ref(), &draft.notes).await?;
            (
                PurchaseDraft::from_analysis(draft.notes, analysis),
                "AI has successfully processed your purchase notes.",
            )
        } else {
            (draft, "Purchase added.")
        };

        // The id is assigned here, after the extraction await.
        let purchase = draft.into_purchase()?;
        let added = self.session.ledger().await.add_purchase(purchase)?;
        self.session.flush().await?;
        Ok(Notice::new(message, added))
    }

    pub async fn add_dealer_contact(
        &self,
        name: &str,
        contact_info: &str,
    ) -> Result<Notice<DealerContact>, TalcError> {
        let added = self
            .session
            .ledger()
            .await
            .add_dealer_contact(name, contact_info)?;
        self.session.flush().await?;
        Ok(Notice::new("Dealer contact added.", added))
    }

    pub async fn import_dealer_contacts(
        &self,
        candidates: Vec<NewDealerContact>,
    ) -> Result<Notice<ImportReport>, TalcError> {
        let report = self
            .session
            .ledger()
            .await
            .import_dealer_contacts(candidates)?;
        self.session.flush().await?;
        let message = match report.imported {
            1 => "1 dealer contact imported.".to_string(),
            n => format!("{} dealer contacts imported.", n),
        };
        Ok(Notice::new(message, report))
    }

    /// Ask the summary service about the current ledger. Read-only.
    pub async fn summary(&self) -> Result<Notice<String>, TalcError> {
        let input = {
            let ledger = self.session.ledger().await;
            if ledger.is_loading() {
                return Err(TalcError::Loading);
            }
            ledger.summary_input()
        };
        let summary = financial_summary(self.ai.as_ref(), &input).await?;
        Ok(Notice::new("AI financial summary is ready.", summary))
    }
}
