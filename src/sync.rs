//! Synchronization between the in-memory ledger and the remote document.
//!
//! A [`SyncSession`] owns the [`Ledger`] and one subscription on the remote
//! store. A background task applies every incoming snapshot wholesale
//! (last snapshot wins). Local transitions reach the remote only through
//! [`SyncSession::flush`], which writes the full tree when the ledger is
//! dirty and does nothing otherwise.
//!
//! Applying a snapshot never marks the ledger dirty, so remote state is not
//! written back. Snapshots whose digest matches a tree this session just
//! wrote are recognized as the echo of that write and skipped, which keeps
//! transitions made while the write was in flight. Snapshots arriving ahead
//! of a pending echo predate that write and are held back; if the write
//! fails, the newest held snapshot is applied then.
//!
//! A write is registered under the same ledger lock that produced its tree,
//! and an arrival is classified and applied under one lock acquisition, so
//! the two always agree on which writes are pending. The ledger lock is
//! never held across a network await.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use talctrack_core::ledger::Ledger;
use talctrack_core::snapshot::LedgerSnapshot;
use talctrack_core::store::{RemoteStore, SnapshotStream};

use crate::error::{one_line, TalcError};

/// Writes whose echo has not arrived after this long are assumed lost.
/// A store may stay silent when a write leaves the tree unchanged.
const ECHO_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded,
    Failed(String),
}

/// How an incoming snapshot relates to this session's own writes.
#[derive(Debug, PartialEq, Eq)]
enum Arrival {
    /// The echo of a write this session made.
    Echo,
    /// Written before a write of ours that has not echoed yet; that write
    /// overwrites it.
    Superseded,
    Fresh,
}

#[derive(Default)]
struct InFlight {
    writes: VecDeque<(String, Instant)>,
    /// Newest snapshot skipped as superseded while writes were pending.
    held: Option<LedgerSnapshot>,
}

struct Shared {
    in_flight: StdMutex<InFlight>,
    last_error: StdMutex<Option<String>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            in_flight: StdMutex::new(InFlight::default()),
            last_error: StdMutex::new(None),
        }
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, InFlight> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.writes.retain(|(_, at)| at.elapsed() < ECHO_TTL);
        in_flight
    }

    fn remember_write(&self, digest: String) {
        self.in_flight().writes.push_back((digest, Instant::now()));
    }

    /// Drop a write that never reached the store. Returns the held snapshot
    /// once no other write is pending.
    fn forget_write(&self, digest: &str) -> Option<LedgerSnapshot> {
        let mut in_flight = self.in_flight();
        if let Some(pos) = in_flight.writes.iter().rposition(|(d, _)| d == digest) {
            in_flight.writes.remove(pos);
        }
        if in_flight.writes.is_empty() {
            in_flight.held.take()
        } else {
            None
        }
    }

    /// Classify a snapshot by digest. The store delivers writes in order,
    /// so an echo also retires every older pending write.
    fn classify(&self, digest: &str) -> Arrival {
        let mut in_flight = self.in_flight();
        match in_flight.writes.iter().position(|(d, _)| d == digest) {
            Some(pos) => {
                in_flight.writes.drain(..=pos);
                in_flight.held = None;
                Arrival::Echo
            }
            None if in_flight.writes.is_empty() => {
                in_flight.held = None;
                Arrival::Fresh
            }
            None => Arrival::Superseded,
        }
    }

    fn hold(&self, snapshot: LedgerSnapshot) {
        self.in_flight().held = Some(snapshot);
    }

    fn set_error(&self, message: Option<String>) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = message;
    }
}

pub struct SyncSession {
    ledger: Arc<Mutex<Ledger>>,
    remote: Arc<dyn RemoteStore>,
    shared: Arc<Shared>,
    load_state: watch::Receiver<LoadState>,
    flush_lock: Mutex<()>,
    task: Option<JoinHandle<()>>,
}

impl SyncSession {
    /// Subscribe to the remote document and start applying snapshots.
    /// The ledger stays in the loading state until the first one arrives.
    ///
    /// # Errors
    ///
    /// [`TalcError::SyncRead`] when the subscription cannot be opened.
    pub async fn open(remote: Arc<dyn RemoteStore>) -> Result<Self, TalcError> {
        let stream = remote.subscribe().await.map_err(|e| {
            tracing::warn!(backend = remote.backend(), error = %e, "subscription failed");
            TalcError::SyncRead(one_line(&e))
        })?;
        tracing::info!(backend = remote.backend(), "sync session open");

        let ledger = Arc::new(Mutex::new(Ledger::loading()));
        let shared = Arc::new(Shared::new());
        let (state_tx, state_rx) = watch::channel(LoadState::Pending);

        let task = tokio::spawn(apply_snapshots(
            stream,
            ledger.clone(),
            shared.clone(),
            state_tx,
        ));

        Ok(Self {
            ledger,
            remote,
            shared,
            load_state: state_rx,
            flush_lock: Mutex::new(()),
            task: Some(task),
        })
    }

    /// Open a session and wait for the initial snapshot.
    pub async fn open_loaded(
        remote: Arc<dyn RemoteStore>,
        timeout: Duration,
    ) -> Result<Self, TalcError> {
        let session = Self::open(remote).await?;
        session.wait_loaded(timeout).await?;
        Ok(session)
    }

    /// Wait until the first snapshot has been applied.
    ///
    /// # Errors
    ///
    /// [`TalcError::SyncRead`] if the subscription fails first or nothing
    /// arrives within `timeout`. Nothing is retried.
    pub async fn wait_loaded(&self, timeout: Duration) -> Result<(), TalcError> {
        let mut rx = self.load_state.clone();
        let waited = tokio::time::timeout(timeout, async {
            rx.wait_for(|s| *s != LoadState::Pending)
                .await
                .map(|s| s.clone())
        })
        .await;

        match waited {
            Ok(Ok(LoadState::Loaded)) => Ok(()),
            Ok(Ok(LoadState::Failed(message))) => Err(TalcError::SyncRead(message)),
            Ok(Ok(LoadState::Pending)) | Ok(Err(_)) => Err(TalcError::SyncRead(
                "subscription ended before the initial snapshot".to_string(),
            )),
            Err(_) => Err(TalcError::SyncRead(format!(
                "no snapshot from the {} store within {}s",
                self.remote.backend(),
                timeout.as_secs_f64()
            ))),
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state.borrow().clone()
    }

    /// Most recent subscription error after the initial load, if any.
    pub fn last_error(&self) -> Option<String> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn backend(&self) -> &str {
        self.remote.backend()
    }

    /// Exclusive access to the ledger. Do not hold the guard across a
    /// network await.
    pub async fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().await
    }

    /// Write the full tree if the ledger is dirty. Returns whether a write
    /// happened.
    ///
    /// # Errors
    ///
    /// [`TalcError::SyncWrite`] when the remote rejects the write. The ledger
    /// stays dirty, so the next flush writes again, unless another writer's
    /// snapshot arrived during the write; that snapshot is applied instead.
    pub async fn flush(&self) -> Result<bool, TalcError> {
        let _serial = self.flush_lock.lock().await;

        let (document, digest, revision) = {
            let ledger = self.ledger.lock().await;
            let Some((snapshot, revision)) = ledger.pending_flush() else {
                return Ok(false);
            };
            let document = snapshot
                .to_value()
                .map_err(|e| TalcError::SyncWrite(one_line(&e)))?;
            let digest = snapshot.digest();
            self.shared.remember_write(digest.clone());
            (document, digest, revision)
        };

        if let Err(e) = self.remote.replace(&document).await {
            let mut ledger = self.ledger.lock().await;
            if let Some(held) = self.shared.forget_write(&digest) {
                tracing::debug!("applying snapshot held behind the failed write");
                ledger.replace_from_snapshot(held);
            }
            tracing::warn!(backend = self.remote.backend(), error = %e, "flush failed");
            return Err(TalcError::SyncWrite(one_line(&e)));
        }

        self.ledger.lock().await.mark_flushed(revision);
        tracing::debug!(backend = self.remote.backend(), revision, "ledger flushed");
        Ok(true)
    }

    /// Stop applying snapshots and release the subscription.
    pub async fn close(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        tracing::info!(backend = self.remote.backend(), "sync session closed");
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn apply_snapshots(
    mut stream: SnapshotStream,
    ledger: Arc<Mutex<Ledger>>,
    shared: Arc<Shared>,
    state: watch::Sender<LoadState>,
) {
    while let Some(item) = stream.next().await {
        let value = match item {
            Ok(value) => value,
            Err(e) => {
                let message = one_line(&e);
                tracing::warn!(error = %message, "subscription ended");
                fail(&state, &shared, message);
                return;
            }
        };

        let snapshot = match LedgerSnapshot::from_value(value) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let message = one_line(&e);
                tracing::warn!(error = %message, "ignoring undecodable snapshot");
                if *state.borrow() == LoadState::Pending {
                    fail(&state, &shared, message);
                    return;
                }
                shared.set_error(Some(message));
                continue;
            }
        };

        let mut guard = ledger.lock().await;
        match shared.classify(&snapshot.digest()) {
            Arrival::Echo => {
                tracing::trace!("skipping echo of own write");
                continue;
            }
            Arrival::Superseded => {
                tracing::debug!("holding snapshot superseded by own write in flight");
                shared.hold(snapshot);
                continue;
            }
            Arrival::Fresh => {}
        }
        guard.replace_from_snapshot(snapshot);
        drop(guard);
        shared.set_error(None);
        state.send_if_modified(|s| {
            if *s == LoadState::Loaded {
                false
            } else {
                *s = LoadState::Loaded;
                true
            }
        });
        tracing::debug!("remote snapshot applied");
    }
    fail(&state, &shared, "subscription closed".to_string());
}

fn fail(state: &watch::Sender<LoadState>, shared: &Shared, message: String) {
    shared.set_error(Some(message.clone()));
    state.send_if_modified(|s| {
        if *s == LoadState::Pending {
            *s = LoadState::Failed(message);
            true
        } else {
            false
        }
    });
}
