// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL medium for the durable tier.
//!
//! One table per namespace, one row per record:
//! ```sql
//! CREATE TABLE cache_records_<namespace> (
//!   id   TEXT PRIMARY KEY,   -- record_id(key)
//!   body BLOB NOT NULL       -- pretty JSON entry
//! )
//! ```
//!
//! ## sqlx Any Driver Quirks
//!
//! The body is stored as BLOB and read back as `Vec<u8>`; the `Any` driver
//! maps TEXT inconsistently across backends. The pool is opened lazily in
//! [`prepare`](StorageMedium::prepare) so the medium can be built from a
//! synchronous factory.

use std::sync::Once;

use async_trait::async_trait;
use sqlx::{any::AnyPoolOptions, AnyPool, Row};
use tokio::sync::OnceCell;
use tracing::info;

use super::traits::{StorageError, StorageMedium};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

pub struct SqlMedium {
    url: String,
    table: String,
    pool: OnceCell<AnyPool>,
}

impl SqlMedium {
    /// Medium for `namespace` in the database at `url`
    /// (e.g. `sqlite:cache.db?mode=rwc` or `sqlite::memory:`).
    pub fn new(url: impl Into<String>, namespace: &str) -> Self {
        Self {
            url: url.into(),
            table: Self::table_name(namespace),
            pool: OnceCell::new(),
        }
    }

    /// Table name for a namespace; anything outside `[A-Za-z0-9_]` becomes `_`.
    fn table_name(namespace: &str) -> String {
        let sanitized: String = namespace
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        format!("cache_records_{}", sanitized)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn pool(&self) -> Result<&AnyPool, StorageError> {
        self.pool
            .get()
            .ok_or_else(|| StorageError::Backend("SQL medium used before prepare()".into()))
    }

    async fn connect(&self) -> Result<AnyPool, StorageError> {
        install_drivers();
        // An in-memory SQLite database lives and dies with its connection.
        let in_memory = self.url.contains(":memory:");
        AnyPoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .min_connections(if in_memory { 1 } else { 0 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(&self.url)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to connect to {}: {}", self.url, e)))
    }
}

#[async_trait]
impl StorageMedium for SqlMedium {
    async fn prepare(&self) -> Result<(), StorageError> {
        let pool = self.pool.get_or_try_init(|| self.connect()).await?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, body BLOB NOT NULL)",
            self.table
        );
        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to create {}: {}", self.table, e)))?;
        info!(table = %self.table, "SQL medium ready");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let sql = format!("SELECT id FROM {}", self.table);
        let rows = sqlx::query(&sql)
            .fetch_all(self.pool()?)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("id")
                    .map_err(|e| StorageError::Backend(e.to_string()))
            })
            .collect()
    }

    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let sql = format!("SELECT body FROM {} WHERE id = ?", self.table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool()?)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        match row {
            Some(row) => row
                .try_get::<Vec<u8>, _>("body")
                .map(Some)
                .map_err(|e| StorageError::Corruption { id: id.to_string(), reason: e.to_string() }),
            None => Ok(None),
        }
    }

    async fn write(&self, id: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {} (id, body) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET body = excluded.body",
            self.table
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(bytes.to_vec())
            .execute(self.pool()?)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.table);
        sqlx::query(&sql)
            .bind(id)
            .execute(self.pool()?)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn record_len(&self, id: &str) -> Result<Option<u64>, StorageError> {
        let sql = format!("SELECT length(body) AS len FROM {} WHERE id = ?", self.table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool()?)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        match row {
            Some(row) => {
                let len: i64 = row.try_get("len").map_err(|e| StorageError::Backend(e.to_string()))?;
                Ok(Some(len.max(0) as u64))
            }
            None => Ok(None),
        }
    }

    fn location(&self) -> String {
        format!("{}#{}", self.url, self.table)
    }
}
