// SPDX-License-Identifier: MIT

//! Local durable cache.
//!
//! One SQLite table keyed by string, holding JSON payloads or raw blobs
//! alongside the tenant they were fetched for and when. The cache is a pure
//! accelerator: every read error degrades to a miss and every write error is
//! dropped with a warning, so a broken cache file never takes the
//! application down with it.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Cache key for a tenant's order list.
pub fn orders_cache_key(tenant_slug: &str) -> String {
    format!("orders:{}", tenant_slug.trim().to_lowercase())
}

/// A cached JSON value with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub fetched_at: DateTime<Utc>,
    pub tenant_slug: String,
    pub value: T,
}

#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
}

impl CacheStore {
    /// Open (creating if needed) the cache database at `path`.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory cache, used by tests.
    pub async fn open_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                fetched_at TEXT NOT NULL,
                tenant_slug TEXT NOT NULL,
                value BLOB NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Read and deserialize a JSON entry. Missing, corrupt or unreadable
    /// entries all come back as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let raw = self.get_blob(key).await?;
        match serde_json::from_slice(&raw.value) {
            Ok(value) => Some(CacheEntry {
                fetched_at: raw.fetched_at,
                tenant_slug: raw.tenant_slug,
                value,
            }),
            Err(e) => {
                tracing::warn!(key, error = %e, "Corrupt cache entry, treating as a miss");
                None
            }
        }
    }

    /// Serialize and store a JSON entry. Failures are logged and dropped.
    pub async fn set<T: Serialize>(&self, key: &str, tenant_slug: &str, value: &T) {
        match serde_json::to_vec(value) {
            Ok(raw) => self.set_blob(key, tenant_slug, &raw).await,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache serialization failed, dropping write");
            }
        }
    }

    /// Read a raw blob entry.
    pub async fn get_blob(&self, key: &str) -> Option<CacheEntry<Vec<u8>>> {
        let row = sqlx::query_as::<_, (String, String, Vec<u8>)>(
            "SELECT fetched_at, tenant_slug, value FROM cache WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(Some((fetched_at, tenant_slug, value))) => {
                let fetched_at = fetched_at
                    .parse::<DateTime<Utc>>()
                    .unwrap_or_else(|_| Utc::now());
                Some(CacheEntry {
                    fetched_at,
                    tenant_slug,
                    value,
                })
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed, treating as a miss");
                None
            }
        }
    }

    /// Store a raw blob entry, replacing any existing value for the key.
    pub async fn set_blob(&self, key: &str, tenant_slug: &str, value: &[u8]) {
        let result = sqlx::query(
            r#"
            INSERT INTO cache (key, fetched_at, tenant_slug, value)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                fetched_at = excluded.fetched_at,
                tenant_slug = excluded.tenant_slug,
                value = excluded.value
            "#,
        )
        .bind(key)
        .bind(Utc::now().to_rfc3339())
        .bind(tenant_slug)
        .bind(value)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(key, error = %e, "Cache write failed, dropping entry");
        }
    }

    /// Whether a key is present.
    pub async fn contains(&self, key: &str) -> bool {
        self.get_blob(key).await.is_some()
    }

    /// Delete one entry. Errors are logged and dropped.
    pub async fn delete(&self, key: &str) {
        if let Err(e) = sqlx::query("DELETE FROM cache WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
        {
            tracing::warn!(key, error = %e, "Cache delete failed");
        }
    }

    /// Delete every entry whose key starts with `prefix`.
    pub async fn delete_prefix(&self, prefix: &str) {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        if let Err(e) = sqlx::query("DELETE FROM cache WHERE key LIKE ? ESCAPE '\\'")
            .bind(&pattern)
            .execute(&self.pool)
            .await
        {
            tracing::warn!(prefix, error = %e, "Cache prefix delete failed");
        }
    }
}
