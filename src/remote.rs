//! Remote store selection.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::firebase::FirebaseRemote;
use crate::sqlite_store::SqliteRemote;
use talctrack_core::store::memory::InMemoryRemote;
use talctrack_core::store::RemoteStore;

/// Create the backend named by `store.backend`.
///
/// | Config Value | Backend |
/// |-------------|----------|
/// | `"memory"` | [`InMemoryRemote`] |
/// | `"sqlite"` | [`SqliteRemote`] |
/// | `"firebase"` | [`FirebaseRemote`] |
pub async fn create_remote(config: &StoreConfig) -> Result<Arc<dyn RemoteStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryRemote::new())),
        "sqlite" => Ok(Arc::new(SqliteRemote::open(config).await?)),
        "firebase" => Ok(Arc::new(FirebaseRemote::from_config(config)?)),
        other => bail!("Unknown store backend: {}", other),
    }
}
