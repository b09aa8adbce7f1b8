//! # TalcTrack Core
//!
//! Runtime-agnostic logic for TalcTrack: ledger models, the state machine
//! that owns them, the remote document codec, and the remote store trait.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Network
//! backends live in the `talctrack` crate and implement
//! [`store::RemoteStore`].

pub mod error;
pub mod ledger;
pub mod models;
pub mod report;
pub mod snapshot;
pub mod store;
