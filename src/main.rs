//! # TalcTrack CLI (`talc`)
//!
//! One command per bookkeeping intent, plus `serve` for the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! talc --config ./config/talc.toml <command>
//! ```
//!
//! ## Examples
//!
//! ```bash
//! talc init
//! talc receivable add "Customer A" 1500
//! talc payable add "Supplier X" 2000 --due 2024-07-01
//! talc purchase add "Bought 100kg talc for $500 from Dealer B, 555-123-4567" --analyze
//! talc contact import ./contacts.json
//! talc overview
//! talc summary
//! talc serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use talctrack::commands;
use talctrack::config::{self, Config};
use talctrack::logging;
use talctrack_core::models::{parse_due_date, PurchaseDraft};

/// TalcTrack: receivables, payables, purchases and dealer contacts for a
/// small trading business.
#[derive(Parser)]
#[command(
    name = "talc",
    about = "TalcTrack bookkeeping ledger with AI purchase analysis",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/talc.toml`. When the file does not exist a
    /// process-local store is used and AI is disabled.
    #[arg(long, global = true, default_value = "./config/talc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the configured store (creates the SQLite schema).
    Init,

    /// Show store, AI provider and collection counts.
    Status,

    /// Money owed to the business.
    Receivable {
        #[command(subcommand)]
        action: ReceivableAction,
    },

    /// Money the business owes.
    Payable {
        #[command(subcommand)]
        action: PayableAction,
    },

    /// Logged purchases.
    Purchase {
        #[command(subcommand)]
        action: PurchaseAction,
    },

    /// Extract structured fields from purchase notes without saving.
    Analyze {
        /// Free-text purchase notes.
        notes: String,
    },

    /// Dealer contacts.
    Contact {
        #[command(subcommand)]
        action: ContactAction,
    },

    /// Cleared receivables and payables, newest first.
    History,

    /// Total receivables, total payables and net balance.
    Overview,

    /// Generate an AI summary of the financial status.
    Summary,

    /// Start the JSON HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum ReceivableAction {
    /// Record money owed by a payer.
    Add {
        payer: String,
        #[arg(allow_negative_numbers = true)]
        amount: f64,
    },
    /// Move a receivable to history.
    Clear { id: String },
    List,
}

#[derive(Subcommand)]
enum PayableAction {
    /// Record money owed to a payee.
    Add {
        payee: String,
        #[arg(allow_negative_numbers = true)]
        amount: f64,
        /// Due date (YYYY-MM-DD).
        #[arg(long, default_value = "")]
        due: String,
    },
    /// Move a payable to history.
    Clear { id: String },
    List,
}

#[derive(Subcommand)]
enum PurchaseAction {
    /// Log a purchase from free-text notes.
    Add {
        notes: String,
        /// Fill summary, category, quantity, price and dealer from the notes
        /// using the configured AI provider.
        #[arg(long)]
        analyze: bool,
        #[arg(long, conflicts_with = "analyze")]
        summary: Option<String>,
        #[arg(long, conflicts_with = "analyze")]
        category: Option<String>,
        #[arg(long, conflicts_with = "analyze")]
        quantity: Option<f64>,
        #[arg(long, conflicts_with = "analyze")]
        price: Option<f64>,
        /// Dealer contact information.
        #[arg(long, conflicts_with = "analyze")]
        dealer: Option<String>,
    },
    List,
}

#[derive(Subcommand)]
enum ContactAction {
    /// Add a dealer contact.
    Add { name: String, contact_info: String },
    /// Bulk-import contacts from a JSON address-book export.
    Import { file: PathBuf },
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        match config::load_config(&cli.config) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("error: {:#}", e);
                std::process::exit(2);
            }
        }
    } else {
        Config::minimal()
    };
    logging::init(&cfg.logging);
    if !cli.config.exists() {
        tracing::warn!(path = %cli.config.display(), "config file not found; using in-memory store");
    }

    if let Err(e) = run(cli.command, &cfg).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, cfg: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Init => commands::run_init(cfg).await,
        Commands::Status => commands::run_status(cfg).await,
        Commands::Receivable { action } => match action {
            ReceivableAction::Add { payer, amount } => {
                commands::run_add_receivable(cfg, &payer, amount).await
            }
            ReceivableAction::Clear { id } => commands::run_clear_receivable(cfg, &id).await,
            ReceivableAction::List => commands::run_list_receivables(cfg).await,
        },
        Commands::Payable { action } => match action {
            PayableAction::Add { payee, amount, due } => {
                let due_date = parse_due_date(&due)?;
                commands::run_add_payable(cfg, &payee, amount, due_date).await
            }
            PayableAction::Clear { id } => commands::run_clear_payable(cfg, &id).await,
            PayableAction::List => commands::run_list_payables(cfg).await,
        },
        Commands::Purchase { action } => match action {
            PurchaseAction::Add {
                notes,
                analyze,
                summary,
                category,
                quantity,
                price,
                dealer,
            } => {
                let draft = PurchaseDraft {
                    notes,
                    summary,
                    category,
                    quantity,
                    price,
                    dealer_contact_info: dealer,
                };
                commands::run_add_purchase(cfg, draft, analyze).await
            }
            PurchaseAction::List => commands::run_list_purchases(cfg).await,
        },
        Commands::Analyze { notes } => commands::run_analyze(cfg, &notes).await,
        Commands::Contact { action } => match action {
            ContactAction::Add { name, contact_info } => {
                commands::run_add_contact(cfg, &name, &contact_info).await
            }
            ContactAction::Import { file } => commands::run_import_contacts(cfg, &file).await,
            ContactAction::List => commands::run_list_contacts(cfg).await,
        },
        Commands::History => commands::run_history(cfg).await,
        Commands::Overview => commands::run_overview(cfg).await,
        Commands::Summary => commands::run_summary(cfg).await,
        Commands::Serve => commands::run_serve(cfg).await,
    }
}
