//! Remote state store abstraction.
//!
//! The [`RemoteStore`] trait models the single shared document that mirrors
//! the ledger: a subscription that yields the whole tree every time it
//! changes, and a whole-tree replace. There is no partial update, no
//! version check and no merge; concurrent writers race and the last write
//! wins.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

/// Stream of full documents. The first item is the document as it stands
/// when the subscription opens; `null` means the document does not exist.
///
/// Dropping the stream releases the subscription.
pub type SnapshotStream = BoxStream<'static, Result<Value>>;

/// Abstract remote document backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`subscribe`](RemoteStore::subscribe) | Stream every version of the document |
/// | [`replace`](RemoteStore::replace) | Overwrite the whole document |
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short backend label used in logs (`"firebase"`, `"sqlite"`, `"memory"`).
    fn backend(&self) -> &str;

    /// Open a change subscription on the document.
    async fn subscribe(&self) -> Result<SnapshotStream>;

    /// Replace the whole document with `document`.
    async fn replace(&self, document: &Value) -> Result<()>;
}
