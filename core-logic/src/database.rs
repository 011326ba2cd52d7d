use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::StoreError;

/// One persisted wallet.
///
/// `id` doubles as the sweep order: the staking workflow forwards leftover
/// native balance to the wallet with the next-higher id. The private key is
/// stored in cleartext to stay compatible with the original data layout, so
/// `Debug` redacts it and the record zeroizes its key material on drop.
#[derive(Clone, Serialize, sqlx::FromRow, Zeroize, ZeroizeOnDrop)]
pub struct WalletRecord {
    pub id: i64,
    pub address: String,
    pub private_key: String,
    pub transfer_progress: i64,
    pub staking_complete: bool,
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("private_key", &"***REDACTED***")
            .field("transfer_progress", &self.transfer_progress)
            .field("staking_complete", &self.staking_complete)
            .finish()
    }
}

/// Persisted collection of generated wallets.
///
/// Updates are last-write-wins; only one workflow instance is expected to run
/// at a time.
#[derive(Debug, Clone)]
pub struct KeyStore {
    pool: SqlitePool,
}

impl KeyStore {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    pub const DEFAULT_TIMEOUT_MS: u64 = 30000;

    pub async fn open(db_path: &str) -> Result<Self> {
        if !Path::new(db_path).exists() {
            std::fs::File::create(db_path).map_err(|e| StoreError::Io {
                path: db_path.to_string(),
                msg: e.to_string(),
            })?;
            info!("Created new database file: {}", db_path);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(Self::DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_millis(Self::DEFAULT_TIMEOUT_MS))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode=WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous=NORMAL;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&format!("sqlite://{}", db_path))
            .await
            .map_err(|e| StoreError::Connection { msg: e.to_string() })?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS wallets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL UNIQUE,
                private_key TEXT NOT NULL,
                transfer_progress INTEGER NOT NULL DEFAULT 0,
                staking_complete INTEGER NOT NULL DEFAULT 0
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query { msg: e.to_string() })?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_wallets_progress ON wallets(transfer_progress);",
            "CREATE INDEX IF NOT EXISTS idx_wallets_staking ON wallets(transfer_progress, staking_complete);",
        ];
        for idx_sql in indexes {
            if let Err(e) = sqlx::query(idx_sql).execute(&self.pool).await {
                debug!("Index creation skipped (may exist): {}", e);
            }
        }

        Ok(())
    }

    /// Insert one freshly generated wallet. Returns the assigned id.
    pub async fn insert(&self, address: &str, private_key: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO wallets (address, private_key) VALUES (?, ?)")
            .bind(address)
            .bind(private_key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query { msg: e.to_string() })?;
        Ok(result.last_insert_rowid())
    }

    /// Wallets whose progress marker is still below `max_transfer_count`,
    /// in creation order, at most `limit` rows.
    pub async fn find_pending(
        &self,
        max_transfer_count: i64,
        limit: i64,
    ) -> Result<Vec<WalletRecord>> {
        sqlx::query_as::<_, WalletRecord>(
            "SELECT id, address, private_key, transfer_progress, staking_complete
             FROM wallets WHERE transfer_progress < ? ORDER BY id LIMIT ?",
        )
        .bind(max_transfer_count)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query pending wallets")
    }

    /// The single lowest-id wallet that has finished every transfer round but
    /// has not been staked yet.
    pub async fn next_eligible_for_staking(
        &self,
        required_transfer_count: i64,
    ) -> Result<Option<WalletRecord>> {
        sqlx::query_as::<_, WalletRecord>(
            "SELECT id, address, private_key, transfer_progress, staking_complete
             FROM wallets WHERE transfer_progress = ? AND staking_complete = 0
             ORDER BY id LIMIT 1",
        )
        .bind(required_transfer_count)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query next staking candidate")
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<WalletRecord>> {
        sqlx::query_as::<_, WalletRecord>(
            "SELECT id, address, private_key, transfer_progress, staking_complete
             FROM wallets WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query wallet by id")
    }

    /// The wallet with the smallest id greater than `id`, if any. Used as the
    /// sweep target after a successful stake.
    pub async fn next_after(&self, id: i64) -> Result<Option<WalletRecord>> {
        sqlx::query_as::<_, WalletRecord>(
            "SELECT id, address, private_key, transfer_progress, staking_complete
             FROM wallets WHERE id > ? ORDER BY id LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query next wallet in sweep order")
    }

    /// Persist the mutable fields of `record`. Last write wins; there is no
    /// optimistic concurrency control.
    pub async fn update(&self, record: &WalletRecord) -> Result<()> {
        sqlx::query("UPDATE wallets SET transfer_progress = ?, staking_complete = ? WHERE id = ?")
            .bind(record.transfer_progress)
            .bind(record.staking_complete)
            .bind(record.id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query { msg: e.to_string() })?;
        Ok(())
    }

    /// Delete every record irreversibly. Returns how many rows were removed.
    pub async fn drop_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM wallets")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query { msg: e.to_string() })?;
        Ok(result.rows_affected())
    }

    /// Serialize every record to `path` as a JSON array, private keys
    /// included. Returns the number of exported records.
    pub async fn export_all(&self, path: &str) -> Result<usize> {
        let records = sqlx::query_as::<_, WalletRecord>(
            "SELECT id, address, private_key, transfer_progress, staking_complete
             FROM wallets ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to query wallets for export")?;

        let json = serde_json::to_string(&records).context("Failed to serialize wallets")?;
        std::fs::write(path, json).map_err(|e| StoreError::Io {
            path: path.to_string(),
            msg: e.to_string(),
        })?;
        Ok(records.len())
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM wallets")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query { msg: e.to_string() })?;
        Ok(row.0)
    }
}
