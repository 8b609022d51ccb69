//! Durable harvest cursor: the modification-time high-water mark.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use crate::errors::Result;

/// Cursor value used before any harvest has run.
pub const EPOCH_CURSOR: &str = "1900-01-01T00:00:00Z";

#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self) -> Result<Option<String>>;
    async fn set(&self, value: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryCursor {
    value: Mutex<Option<String>>,
}

impl MemoryCursor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursor {
    async fn get(&self) -> Result<Option<String>> {
        Ok(self.value.lock().unwrap().clone())
    }

    async fn set(&self, value: &str) -> Result<()> {
        *self.value.lock().unwrap() = Some(value.to_string());
        Ok(())
    }
}

pub struct SqliteCursor {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCursor {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS harvest_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl CursorStore for SqliteCursor {
    async fn get(&self) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT value FROM harvest_state WHERE key = 'cursor'",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other.into()),
        })
    }

    async fn set(&self, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO harvest_state (key, value) VALUES ('cursor', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn absent_cursor_reads_as_none() {
        let dir = tempdir().unwrap();
        let cursor = SqliteCursor::open(dir.path().join("state.sqlite")).unwrap();
        assert_eq!(cursor.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let cursor = SqliteCursor::open(dir.path().join("state.sqlite")).unwrap();
        cursor.set("2024-02-03T04:05:06Z").await.unwrap();
        assert_eq!(
            cursor.get().await.unwrap().as_deref(),
            Some("2024-02-03T04:05:06Z")
        );
        cursor.set("2024-03-01T00:00:00Z").await.unwrap();
        assert_eq!(
            cursor.get().await.unwrap().as_deref(),
            Some("2024-03-01T00:00:00Z")
        );
    }
}
