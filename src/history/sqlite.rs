use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::PathBuf;
use tokio::task;
use tracing::debug;

use super::{HistoryEntry, HistoryStore};
use crate::tutor::TutoringResponse;

/// SQLite-backed history log
pub struct SqliteHistory {
    /// Path to the SQLite database file
    db_path: PathBuf,
    /// Entries kept before the oldest are dropped
    capacity: usize,
}

impl SqliteHistory {
    /// Open (or create) the history database at the given path
    pub fn new(db_path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let db_path = db_path.into();
        if capacity == 0 {
            bail!("history capacity must be at least 1");
        }

        // Create parent directories if they don't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let history = Self { db_path, capacity };
        history.init_schema()?;

        Ok(history)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn init_schema(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("failed to open database: {}", self.db_path.display()))?;

        // seq orders entries by insertion; recency is insertion order
        conn.execute(
            "CREATE TABLE IF NOT EXISTS history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                question TEXT NOT NULL,
                has_image INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                response TEXT NOT NULL
            )",
            [],
        )
        .context("failed to create history table")?;

        debug!(path = %self.db_path.display(), "initialized history storage");

        Ok(())
    }
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, bool, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_entry(
    (id, question, has_image, timestamp, response): (String, String, bool, String, String),
) -> Result<HistoryEntry> {
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .with_context(|| format!("invalid timestamp for history entry {}", id))?
        .with_timezone(&Utc);
    let response: TutoringResponse = serde_json::from_str(&response)
        .with_context(|| format!("invalid response for history entry {}", id))?;
    Ok(HistoryEntry {
        id,
        question,
        has_image,
        response,
        timestamp,
    })
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    async fn add(
        &self,
        question: &str,
        has_image: bool,
        response: &TutoringResponse,
    ) -> Result<HistoryEntry> {
        let entry = HistoryEntry::new(question, has_image, response.clone());
        let db_path = self.db_path.clone();
        let capacity = self.capacity;
        let stored = entry.clone();

        task::spawn_blocking(move || {
            let mut conn = Connection::open(&db_path)?;
            let data = serde_json::to_string(&stored.response)?;

            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO history (id, question, has_image, timestamp, response)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    stored.id,
                    stored.question,
                    stored.has_image,
                    stored.timestamp.to_rfc3339(),
                    data,
                ],
            )?;
            let dropped = tx.execute(
                "DELETE FROM history WHERE seq NOT IN (
                    SELECT seq FROM history ORDER BY seq DESC LIMIT ?1
                )",
                [capacity as i64],
            )?;
            tx.commit()?;

            debug!(id = %stored.id, dropped, "saved history entry");

            Ok::<_, anyhow::Error>(())
        })
        .await
        .context("spawn_blocking failed")??;

        Ok(entry)
    }

    async fn list(&self) -> Result<Vec<HistoryEntry>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;

            let mut stmt = conn.prepare(
                "SELECT id, question, has_image, timestamp, response
                 FROM history
                 ORDER BY seq DESC",
            )?;

            let rows = stmt
                .query_map([], entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter().map(decode_entry).collect()
        })
        .await
        .context("spawn_blocking failed")?
    }

    async fn get(&self, id: &str) -> Result<Option<HistoryEntry>> {
        let id = id.to_string();
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;

            let row = conn
                .query_row(
                    "SELECT id, question, has_image, timestamp, response
                     FROM history WHERE id = ?1",
                    [&id],
                    entry_from_row,
                )
                .optional()?;

            row.map(decode_entry).transpose()
        })
        .await
        .context("spawn_blocking failed")?
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            let removed = conn.execute("DELETE FROM history WHERE id = ?1", [&id])?;
            debug!(id = %id, removed, "removed history entry");
            Ok::<_, anyhow::Error>(removed > 0)
        })
        .await
        .context("spawn_blocking failed")?
    }

    async fn clear(&self) -> Result<()> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            let removed = conn.execute("DELETE FROM history", [])?;
            debug!(removed, "cleared history");
            Ok::<_, anyhow::Error>(())
        })
        .await
        .context("spawn_blocking failed")??;

        Ok(())
    }
}
