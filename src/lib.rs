//! # TalcTrack
//!
//! Bookkeeping for a small trading business: money owed to it
//! (receivables), money it owes (payables), logged purchases and dealer
//! contacts, mirrored to a hosted realtime document store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  ┌──────────┐
//! │   CLI    │  │   HTTP   │
//! │  (talc)  │  │  (axum)  │
//! └────┬─────┘  └────┬─────┘
//!      └──────┬──────┘
//!             ▼
//!     ┌───────────────┐     ┌──────────────────┐
//!     │ LedgerService │────▶│ extract/summary  │──▶ Gemini / OpenAI
//!     └───────┬───────┘     └──────────────────┘
//!             ▼
//!     ┌───────────────┐     ┌──────────────────┐
//!     │  SyncSession  │◀───▶│   RemoteStore    │  firebase / sqlite / memory
//!     │   (Ledger)    │     └──────────────────┘
//!     └───────────────┘
//! ```
//!
//! The ledger itself, the snapshot codec and the store trait live in the
//! `talctrack-core` crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | User-facing error taxonomy |
//! | [`ai`] | Completion backends (Gemini, OpenAI) |
//! | [`extract`] | Purchase-notes extraction |
//! | [`summary`] | Financial summary generation |
//! | [`sync`] | Ledger/remote synchronization |
//! | [`service`] | User intents shared by CLI and API |
//! | [`firebase`] | Firebase Realtime Database backend |
//! | [`sqlite_store`] | Local SQLite backend |
//! | [`server`] | JSON HTTP API |

pub mod ai;
pub mod commands;
pub mod config;
pub mod contacts_import;
pub mod db;
pub mod error;
pub mod extract;
pub mod firebase;
pub mod logging;
pub mod migrate;
pub mod remote;
pub mod server;
pub mod service;
pub mod sqlite_store;
pub mod sse;
pub mod summary;
pub mod sync;
