//! Persistent record of downloaded items.
//!
//! One SQLite table keyed by `(target_id, item_id)`. Reads go straight to
//! the pool; writes are serialized behind a mutex on top of SQLite's own
//! locking so concurrent workers never race on the WAL.

use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Download ledger.
pub struct Ledger {
    pool: SqlitePool,
    writes: Mutex<()>,
}

impl Ledger {
    /// Open (or create) the ledger file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::filesystem(parent, e))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::Ledger(format!("Failed to open ledger {}: {}", path.display(), e))
            })?;

        let ledger = Self {
            pool,
            writes: Mutex::new(()),
        };
        ledger.create_schema().await?;
        tracing::debug!(path = %path.display(), "Ledger opened");
        Ok(ledger)
    }

    /// A throwaway ledger, for tests and dry runs.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::Ledger(e.to_string()))?;

        // Every in-memory connection is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let ledger = Self {
            pool,
            writes: Mutex::new(()),
        };
        ledger.create_schema().await?;
        Ok(ledger)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS downloaded (
                target_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                downloaded_at INTEGER NOT NULL,
                PRIMARY KEY (target_id, item_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Ledger(format!("Failed to create ledger schema: {}", e)))?;
        Ok(())
    }

    /// Whether `item_id` was downloaded for `target_id`.
    pub async fn has(&self, target_id: &str, item_id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM downloaded WHERE target_id = ? AND item_id = ? LIMIT 1",
        )
        .bind(target_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Record a successful download. Recording a known pair is a no-op.
    pub async fn record(&self, target_id: &str, item_id: &str) -> Result<()> {
        let _guard = self.writes.lock().await;
        sqlx::query(
            "INSERT OR IGNORE INTO downloaded (target_id, item_id, downloaded_at) VALUES (?, ?, ?)",
        )
        .bind(target_id)
        .bind(item_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Number of items recorded for `target_id`.
    pub async fn count_for(&self, target_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM downloaded WHERE target_id = ?")
            .bind(target_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Flush and close all connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_record_and_has() {
        let ledger = Ledger::open_in_memory().await.unwrap();
        assert!(!ledger.has("post:a", "1").await.unwrap());

        ledger.record("post:a", "1").await.unwrap();
        assert!(ledger.has("post:a", "1").await.unwrap());
        assert!(!ledger.has("post:b", "1").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_is_idempotent() {
        let ledger = Ledger::open_in_memory().await.unwrap();
        ledger.record("mix:7", "1").await.unwrap();
        ledger.record("mix:7", "1").await.unwrap();
        ledger.record("mix:7", "2").await.unwrap();
        assert_eq!(ledger.count_for("mix:7").await.unwrap(), 2);
        assert_eq!(ledger.count_for("mix:8").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.sqlite3");

        let ledger = Ledger::open(&path).await.unwrap();
        ledger.record("post:a", "42").await.unwrap();
        ledger.close().await;

        let reopened = Ledger::open(&path).await.unwrap();
        assert!(reopened.has("post:a", "42").await.unwrap());
        reopened.close().await;
    }

    #[tokio::test]
    async fn test_path_with_url_characters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("what? #1 100%").join("ledger.sqlite3");

        let ledger = Ledger::open(&path).await.unwrap();
        ledger.record("post:a", "7").await.unwrap();
        ledger.close().await;

        assert!(path.exists());
        let reopened = Ledger::open(&path).await.unwrap();
        assert!(reopened.has("post:a", "7").await.unwrap());
        reopened.close().await;
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(&dir.path().join("l.db")).await.unwrap());

        let mut handles = Vec::new();
        for worker in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    ledger.record("post:a", &format!("{}", i)).await.unwrap();
                    ledger
                        .record("post:a", &format!("w{}-{}", worker, i))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ledger.count_for("post:a").await.unwrap(), 10 + 80);
        ledger.close().await;
    }
}
