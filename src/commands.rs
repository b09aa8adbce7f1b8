//! CLI command implementations.
//!
//! Each `run_*` function opens a [`LedgerService`] against the configured
//! store, performs one intent, prints the outcome to stdout and releases
//! the subscription. Errors are returned to `main`, which prints them as a
//! single `error: ...` line.

use anyhow::Result;
use chrono::{DateTime, NaiveDate};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use talctrack_core::models::{Payable, PurchaseDraft, Receivable};
use talctrack_core::report::format_money;

use crate::ai::{create_backend, CompletionBackend, DisabledBackend};
use crate::config::Config;
use crate::contacts_import::read_contacts;
use crate::error::TalcError;
use crate::remote::create_remote;
use crate::server;
use crate::service::LedgerService;
use crate::sqlite_store::SqliteRemote;
use crate::sync::SyncSession;

/// Connect to the store and wait for the initial snapshot. The AI backend
/// is only built when `needs_ai` is set, so a missing API key does not
/// block bookkeeping commands.
pub async fn open_service(config: &Config, needs_ai: bool) -> Result<LedgerService> {
    let ai: Arc<dyn CompletionBackend> = if needs_ai {
        create_backend(&config.ai).map_err(|e| TalcError::Config(format!("{:#}", e)))?
    } else {
        Arc::new(DisabledBackend)
    };

    let remote = create_remote(&config.store)
        .await
        .map_err(|e| TalcError::SyncRead(format!("{:#}", e)))?;
    let session = SyncSession::open_loaded(
        remote,
        Duration::from_secs(config.store.load_timeout_secs),
    )
    .await?;
    Ok(LedgerService::new(session, ai))
}

pub async fn run_init(config: &Config) -> Result<()> {
    match config.store.backend.as_str() {
        "sqlite" => {
            let store = SqliteRemote::open(&config.store).await?;
            drop(store);
            println!("Database initialized successfully.");
        }
        _ => {
            let service = open_service(config, false).await?;
            println!("Connected to the {} store.", service.session().backend());
            service.close().await;
        }
    }
    Ok(())
}

pub async fn run_status(config: &Config) -> Result<()> {
    let service = open_service(config, false).await?;
    let view = service.view().await;
    let ledger = &view.ledger;

    println!("TalcTrack status");
    println!("================");
    println!();
    println!("  Store:        {}", service.session().backend());
    println!("  AI provider:  {} ({})", config.ai.provider, config.ai.model_name());
    println!();
    println!("  Receivables:  {}", ledger.receivables.len());
    println!("  Payables:     {}", ledger.payables.len());
    println!("  Purchases:    {}", ledger.purchases.len());
    println!("  Contacts:     {}", ledger.dealer_contacts.len());
    println!(
        "  Cleared:      {} receivables, {} payables",
        ledger.historical_receivables.len(),
        ledger.historical_payables.len()
    );
    service.close().await;

    if config.store.backend == "sqlite" {
        let store = SqliteRemote::open(&config.store).await?;
        match store.stat().await? {
            Some((digest, updated_at)) => {
                let when = DateTime::from_timestamp(updated_at, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| updated_at.to_string());
                println!("  Last write:   {} ({})", when, digest.get(..12).unwrap_or(&digest));
            }
            None => println!("  Last write:   never"),
        }
    }
    Ok(())
}

pub async fn run_add_receivable(config: &Config, payer: &str, amount: f64) -> Result<()> {
    let service = open_service(config, false).await?;
    let result = service.add_receivable(payer, amount).await;
    service.close().await;
    let notice = result?;
    println!("{}", notice.message);
    print_receivable(&notice.data);
    Ok(())
}

pub async fn run_clear_receivable(config: &Config, id: &str) -> Result<()> {
    let service = open_service(config, false).await?;
    let result = service.clear_receivable(id).await;
    service.close().await;
    println!("{}", result?.message);
    Ok(())
}

pub async fn run_list_receivables(config: &Config) -> Result<()> {
    let service = open_service(config, false).await?;
    let view = service.view().await;
    service.close().await;

    if view.ledger.receivables.is_empty() {
        println!("No receivables.");
    }
    for receivable in &view.ledger.receivables {
        print_receivable(receivable);
    }
    Ok(())
}

pub async fn run_add_payable(
    config: &Config,
    payee: &str,
    amount: f64,
    due_date: NaiveDate,
) -> Result<()> {
    let service = open_service(config, false).await?;
    let result = service.add_payable(payee, amount, due_date).await;
    service.close().await;
    let notice = result?;
    println!("{}", notice.message);
    print_payable(&notice.data);
    Ok(())
}

pub async fn run_clear_payable(config: &Config, id: &str) -> Result<()> {
    let service = open_service(config, false).await?;
    let result = service.clear_payable(id).await;
    service.close().await;
    println!("{}", result?.message);
    Ok(())
}

pub async fn run_list_payables(config: &Config) -> Result<()> {
    let service = open_service(config, false).await?;
    let view = service.view().await;
    service.close().await;

    if view.ledger.payables.is_empty() {
        println!("No payables.");
    }
    for payable in &view.ledger.payables {
        print_payable(payable);
    }
    Ok(())
}

pub async fn run_add_purchase(config: &Config, draft: PurchaseDraft, analyze: bool) -> Result<()> {
    let service = open_service(config, analyze).await?;
    let result = service.add_purchase(draft, analyze).await;
    service.close().await;
    let notice = result?;
    println!("{}", notice.message);

    let purchase = &notice.data;
    println!("  id:        {}", purchase.id);
    if let Some(summary) = &purchase.summary {
        println!("  summary:   {}", summary);
    }
    if let Some(category) = &purchase.category {
        println!("  category:  {}", category);
    }
    if let Some(quantity) = purchase.quantity {
        println!("  quantity:  {}", quantity);
    }
    if let Some(price) = purchase.price {
        println!("  price:     {}", format_money(price));
    }
    if let Some(contact) = &purchase.dealer_contact_info {
        println!("  dealer:    {}", contact);
    }
    Ok(())
}

pub async fn run_list_purchases(config: &Config) -> Result<()> {
    let service = open_service(config, false).await?;
    let view = service.view().await;
    service.close().await;

    if view.ledger.purchases.is_empty() {
        println!("No purchases.");
    }
    for purchase in &view.ledger.purchases {
        let category = purchase.category.as_deref().unwrap_or("-");
        let price = purchase.price.map(format_money).unwrap_or_else(|| "-".into());
        println!("{}  {:<16} {:>12}  {}", purchase.id, category, price, purchase.notes);
    }
    Ok(())
}

/// Run extraction only; the ledger is not opened.
pub async fn run_analyze(config: &Config, notes: &str) -> Result<()> {
    let ai = create_backend(&config.ai).map_err(|e| TalcError::Config(format!("{:#}", e)))?;
    let analysis = crate::extract::analyze_purchase_notes(ai.as_ref(), notes).await?;
    println!("Purchase notes analyzed.");
    println!("  summary:   {}", analysis.summary);
    println!("  category:  {}", analysis.category);
    println!("  quantity:  {}", analysis.quantity);
    println!("  price:     {}", format_money(analysis.price));
    println!("  dealer:    {}", analysis.dealer_contact_info);
    Ok(())
}

pub async fn run_add_contact(config: &Config, name: &str, contact_info: &str) -> Result<()> {
    let service = open_service(config, false).await?;
    let result = service.add_dealer_contact(name, contact_info).await;
    service.close().await;
    let notice = result?;
    println!("{}", notice.message);
    println!("{}  {}  {}", notice.data.id, notice.data.name, notice.data.contact_info);
    Ok(())
}

pub async fn run_import_contacts(config: &Config, file: &Path) -> Result<()> {
    let candidates = read_contacts(file)?;
    let service = open_service(config, false).await?;
    let result = service.import_dealer_contacts(candidates).await;
    service.close().await;
    let notice = result?;
    println!("{}", notice.message);
    println!(
        "  {} already present, {} skipped as incomplete",
        notice.data.duplicates, notice.data.invalid
    );
    Ok(())
}

pub async fn run_list_contacts(config: &Config) -> Result<()> {
    let service = open_service(config, false).await?;
    let view = service.view().await;
    service.close().await;

    if view.ledger.dealer_contacts.is_empty() {
        println!("No dealer contacts.");
    }
    for contact in &view.ledger.dealer_contacts {
        println!("{}  {:<24} {}", contact.id, contact.name, contact.contact_info);
    }
    Ok(())
}

pub async fn run_history(config: &Config) -> Result<()> {
    let service = open_service(config, false).await?;
    let view = service.view().await;
    service.close().await;

    println!("Cleared receivables:");
    if view.ledger.historical_receivables.is_empty() {
        println!("  (none)");
    }
    for receivable in &view.ledger.historical_receivables {
        print_receivable(receivable);
    }
    println!();
    println!("Cleared payables:");
    if view.ledger.historical_payables.is_empty() {
        println!("  (none)");
    }
    for payable in &view.ledger.historical_payables {
        print_payable(payable);
    }
    Ok(())
}

pub async fn run_overview(config: &Config) -> Result<()> {
    let service = open_service(config, false).await?;
    let overview = service.overview().await;
    service.close().await;

    println!("Total receivables:  {:>14}", format_money(overview.total_receivables));
    println!("Total payables:     {:>14}", format_money(overview.total_payables));
    println!("Net balance:        {:>14}", format_money(overview.net_balance));
    Ok(())
}

pub async fn run_summary(config: &Config) -> Result<()> {
    let service = open_service(config, true).await?;
    let result = service.summary().await;
    service.close().await;
    let notice = result?;
    println!("{}", notice.message);
    println!();
    println!("{}", notice.data);
    Ok(())
}

pub async fn run_serve(config: &Config) -> Result<()> {
    let service = open_service(config, config.ai.is_enabled()).await?;
    server::run_server(config, service).await
}

fn print_receivable(receivable: &Receivable) {
    println!(
        "{}  {:<24} {:>12}",
        receivable.id,
        receivable.payer,
        format_money(receivable.amount)
    );
}

fn print_payable(payable: &Payable) {
    println!(
        "{}  {:<24} {:>12}  due {}",
        payable.id,
        payable.payee,
        format_money(payable.amount),
        payable.due_date.format("%Y-%m-%d")
    );
}
