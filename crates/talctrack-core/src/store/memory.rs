//! In-memory [`RemoteStore`] for tests and offline runs.
//!
//! Holds one JSON document behind a `Mutex` and fans every replace out to
//! all live subscribers over unbounded channels.

use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use serde_json::Value;

use super::{RemoteStore, SnapshotStream};

struct Inner {
    document: Value,
    subscribers: Vec<UnboundedSender<Result<Value>>>,
    writes: usize,
    fail_writes: bool,
    fail_subscribe: bool,
}

/// Process-local document store.
pub struct InMemoryRemote {
    inner: Mutex<Inner>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::with_document(Value::Null)
    }

    pub fn with_document(document: Value) -> Self {
        Self {
            inner: Mutex::new(Inner {
                document,
                subscribers: Vec::new(),
                writes: 0,
                fail_writes: false,
                fail_subscribe: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current document.
    pub fn document(&self) -> Value {
        self.lock().document.clone()
    }

    /// Number of successful replaces.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Number of subscriptions whose stream is still alive.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }

    /// Make subsequent replaces fail, simulating a lost connection.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make subsequent subscriptions fail, simulating a rejected listener.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.lock().fail_subscribe = fail;
    }

    /// Push an error to every live subscriber.
    pub fn broadcast_error(&self, message: &str) {
        let mut inner = self.lock();
        inner
            .subscribers
            .retain(|tx| tx.unbounded_send(Err(anyhow::anyhow!(message.to_string()))).is_ok());
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn subscribe(&self) -> Result<SnapshotStream> {
        let mut inner = self.lock();
        if inner.fail_subscribe {
            bail!("permission denied: subscription rejected");
        }
        let (tx, rx) = unbounded();
        // An unbounded channel only rejects sends once the receiver is gone,
        // and the receiver is still in scope here.
        let _ = tx.unbounded_send(Ok(inner.document.clone()));
        inner.subscribers.push(tx);
        Ok(rx.boxed())
    }

    async fn replace(&self, document: &Value) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_writes {
            bail!("network unavailable: write rejected");
        }
        inner.document = document.clone();
        inner.writes += 1;
        let doc = inner.document.clone();
        inner
            .subscribers
            .retain(|tx| tx.unbounded_send(Ok(doc.clone())).is_ok());
        Ok(())
    }
}
