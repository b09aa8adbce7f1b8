use anyhow::Result;
use sqlx::SqlitePool;

/// Create the `documents` table. Safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per document path; `body` holds the serialized tree and
    // `digest`/`updated_at` back `talc status`.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            path TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            digest TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
