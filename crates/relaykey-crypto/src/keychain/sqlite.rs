//! `SQLite`-backed keychain.

use std::path::PathBuf;
use std::sync::OnceLock;

use relaykey_core::db::{DatabaseError, open_pool, open_pool_in_memory, unix_timestamp};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

use super::{KEYCHAIN_COMPONENT, KeyStore};
use crate::error::CryptoError;
use crate::lifecycle::{InitGate, LifecycleState};

const CREATE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS keychain (
        tag        TEXT PRIMARY KEY NOT NULL,
        material   TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
";

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Keychain stored in a `keychain` table. The pool is opened lazily by
/// `init`.
#[derive(Debug)]
pub struct SqliteKeyStore {
    location: Location,
    gate: InitGate,
    pool: OnceLock<Pool<Sqlite>>,
}

impl SqliteKeyStore {
    /// Keychain in the database file at `path` (created if missing).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::at(Location::File(path.into()))
    }

    /// Keychain in a private in-memory database.
    pub fn in_memory() -> Self {
        Self::at(Location::Memory)
    }

    const fn at(location: Location) -> Self {
        Self {
            location,
            gate: InitGate::new(KEYCHAIN_COMPONENT),
            pool: OnceLock::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.gate.state()
    }

    fn pool(&self) -> Result<&Pool<Sqlite>, CryptoError> {
        self.gate.ensure_ready()?;
        self.pool.get().ok_or_else(|| self.gate.not_initialized())
    }

    async fn open(&self) -> Result<(), CryptoError> {
        let pool = if let Some(pool) = self.pool.get() {
            pool
        } else {
            let opened = match &self.location {
                Location::File(path) => open_pool(path).await?,
                Location::Memory => open_pool_in_memory().await?,
            };
            self.pool.get_or_init(|| opened)
        };

        sqlx::query(CREATE_TABLE)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("Keychain table ready");
        Ok(())
    }
}

impl KeyStore for SqliteKeyStore {
    async fn init(&self) -> Result<(), CryptoError> {
        self.gate.initialize(|| self.open()).await
    }

    async fn has(&self, tag: &str) -> Result<bool, CryptoError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM keychain WHERE tag = ?")
            .bind(tag)
            .fetch_optional(self.pool()?)
            .await?;
        Ok(found.is_some())
    }

    async fn get(&self, tag: &str) -> Result<String, CryptoError> {
        sqlx::query_scalar::<_, String>("SELECT material FROM keychain WHERE tag = ?")
            .bind(tag)
            .fetch_optional(self.pool()?)
            .await?
            .ok_or_else(|| CryptoError::not_found(tag))
    }

    async fn set(&self, tag: &str, material: &str) -> Result<(), CryptoError> {
        sqlx::query(
            r"
            INSERT INTO keychain (tag, material, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(tag) DO UPDATE SET
                material = excluded.material,
                updated_at = excluded.updated_at
            ",
        )
        .bind(tag)
        .bind(material)
        .bind(unix_timestamp())
        .execute(self.pool()?)
        .await?;

        debug!(tag, "Keychain entry written");
        Ok(())
    }

    async fn delete(&self, tag: &str) -> Result<(), CryptoError> {
        let result = sqlx::query("DELETE FROM keychain WHERE tag = ?")
            .bind(tag)
            .execute(self.pool()?)
            .await?;

        debug!(tag, removed = result.rows_affected(), "Keychain entry deleted");
        Ok(())
    }
}
