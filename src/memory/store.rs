//! Memory record store.
//!
//! The consistency engine only reads records; writes happen here so the CLI
//! can persist a memory after it passes the checks.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::embedding::store::format_ts;
use crate::memory::types::MemoryRecord;
use crate::vector;

/// Insert a new memory and return its id (UUID v7, so ids sort by creation).
pub fn insert_memory(conn: &Connection, content: &str, embedding: Option<&[f32]>) -> Result<String> {
    anyhow::ensure!(!content.trim().is_empty(), "memory content must not be empty");

    let id = uuid::Uuid::now_v7().to_string();
    let blob = embedding.map(vector::to_bytes);

    conn.execute(
        "INSERT INTO memories (id, content, embedding, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, content, blob, format_ts(Utc::now())],
    )
    .context("failed to insert memory")?;

    tracing::debug!(id = %id, embedded = embedding.is_some(), "memory stored");
    Ok(id)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let blob: Option<Vec<u8>> = row.get(2)?;
    Ok(MemoryRecord {
        id: row.get(0)?,
        content: row.get(1)?,
        embedding: blob.map(|b| vector::from_bytes(&b)),
    })
}

pub fn get_memory(conn: &Connection, id: &str) -> Result<Option<MemoryRecord>> {
    let record = conn
        .query_row(
            "SELECT id, content, embedding FROM memories WHERE id = ?1",
            params![id],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

/// All memories, oldest first.
pub fn list_memories(conn: &Connection) -> Result<Vec<MemoryRecord>> {
    let mut stmt =
        conn.prepare("SELECT id, content, embedding FROM memories ORDER BY created_at, id")?;
    let records = stmt
        .query_map([], record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

pub fn count_memories(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
    Ok(count as u64)
}
