//! Durable (tier 2) embedding storage.
//!
//! [`DurableTier`] is the contract the cache needs from a persistent
//! key-value store; [`SqliteEmbeddingStore`] implements it on the
//! `embedding_cache` table.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::vector;

/// A persisted cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEmbedding {
    pub key: String,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

/// Aggregate numbers over the durable tier.
#[derive(Debug, Clone, Default)]
pub struct DurableStats {
    pub entry_count: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub approx_bytes: u64,
}

/// Persistent key → vector store. All failures are [`Error::CacheIo`].
pub trait DurableTier: Send {
    /// Fetch an entry and bump its `last_accessed_at` to `now`.
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<StoredEmbedding>>;

    /// Insert or replace an entry.
    fn put(&self, entry: &StoredEmbedding) -> Result<()>;

    /// Delete entries created before `cutoff`. Returns the number removed.
    fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    fn stats(&self) -> Result<DurableStats>;

    fn clear(&self) -> Result<usize>;
}

/// Fixed-width UTC timestamps so string order matches time order in SQL.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::cache_io(format!("bad timestamp {s:?}: {e}")))
}

pub struct SqliteEmbeddingStore {
    conn: Connection,
}

impl SqliteEmbeddingStore {
    /// Wrap a connection whose schema is already initialized.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open the database file, creating schema as needed.
    pub fn open(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        Ok(Self::new(crate::db::open_database(path)?))
    }
}

impl DurableTier for SqliteEmbeddingStore {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<StoredEmbedding>> {
        let row: Option<(Vec<u8>, String)> = self
            .conn
            .query_row(
                "SELECT vector, created_at FROM embedding_cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((blob, created_at)) = row else {
            return Ok(None);
        };

        self.conn.execute(
            "UPDATE embedding_cache SET last_accessed_at = ?1 WHERE key = ?2",
            params![format_ts(now), key],
        )?;

        Ok(Some(StoredEmbedding {
            key: key.to_string(),
            vector: vector::from_bytes(&blob),
            created_at: parse_ts(&created_at)?,
            last_accessed_at: now,
        }))
    }

    fn put(&self, entry: &StoredEmbedding) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO embedding_cache \
             (key, vector, dimensions, created_at, last_accessed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.key,
                vector::to_bytes(&entry.vector),
                entry.vector.len() as i64,
                format_ts(entry.created_at),
                format_ts(entry.last_accessed_at),
            ],
        )?;
        Ok(())
    }

    fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM embedding_cache WHERE created_at < ?1",
            params![format_ts(cutoff)],
        )?;
        Ok(removed)
    }

    fn stats(&self) -> Result<DurableStats> {
        let (count, oldest, newest, bytes): (i64, Option<String>, Option<String>, Option<i64>) =
            self.conn.query_row(
                "SELECT COUNT(*), MIN(created_at), MAX(created_at), \
                 SUM(LENGTH(vector) + LENGTH(key)) FROM embedding_cache",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        Ok(DurableStats {
            entry_count: count as u64,
            oldest_entry: oldest.as_deref().map(parse_ts).transpose()?,
            newest_entry: newest.as_deref().map(parse_ts).transpose()?,
            approx_bytes: bytes.unwrap_or(0) as u64,
        })
    }

    fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM embedding_cache", [])?)
    }
}
