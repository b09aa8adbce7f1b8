//! Local single-file document store.
//!
//! Keeps the ledger tree as one row of the `documents` table, keyed by the
//! configured root path. Subscribers see the stored tree first, then every
//! later replace made through the same [`SqliteRemote`]. Writes from other
//! processes are not observed until the next subscription.

use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::config::StoreConfig;
use crate::{db, migrate};
use talctrack_core::store::{RemoteStore, SnapshotStream};

pub struct SqliteRemote {
    pool: SqlitePool,
    path: String,
    subscribers: Mutex<Vec<UnboundedSender<Result<Value>>>>,
}

impl SqliteRemote {
    /// Open the database file, creating the schema if it is missing.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let pool = db::connect(&config.path)
            .await
            .with_context(|| format!("Failed to open {}", config.path.display()))?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::with_pool(pool, &config.root_path))
    }

    pub fn with_pool(pool: SqlitePool, path: &str) -> Self {
        Self {
            pool,
            path: path.to_string(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Stored tree, or `null` when nothing has been written yet.
    pub async fn load(&self) -> Result<Value> {
        let row = sqlx::query("SELECT body FROM documents WHERE path = ?")
            .bind(&self.path)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let body: String = row.get("body");
                serde_json::from_str(&body).context("stored ledger document is not valid JSON")
            }
            None => Ok(Value::Null),
        }
    }

    /// Digest and write time of the stored tree, if any.
    pub async fn stat(&self) -> Result<Option<(String, i64)>> {
        let row = sqlx::query("SELECT digest, updated_at FROM documents WHERE path = ?")
            .bind(&self.path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| (r.get("digest"), r.get("updated_at"))))
    }

    fn broadcast(&self, document: &Value) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.unbounded_send(Ok(document.clone())).is_ok());
    }
}

#[async_trait]
impl RemoteStore for SqliteRemote {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn subscribe(&self) -> Result<SnapshotStream> {
        let document = self.load().await?;
        let (tx, rx) = unbounded();
        tx.unbounded_send(Ok(document))
            .context("subscription closed before the first snapshot")?;
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        Ok(rx.boxed())
    }

    async fn replace(&self, document: &Value) -> Result<()> {
        let body = serde_json::to_string(document)?;
        let digest = hex::encode(Sha256::digest(body.as_bytes()));
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO documents (path, body, digest, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                body = excluded.body,
                digest = excluded.digest,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.path)
        .bind(&body)
        .bind(&digest)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(path = %self.path, %digest, "sqlite document replaced");
        self.broadcast(document);
        Ok(())
    }
}
