//! Job queue collaborator: durable task dispatch across workers.
//!
//! Delivery is at-least-once; ingestion is idempotent, so duplicate
//! delivery is harmless.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Queue holding harvest-sweep dispatch work.
pub const QUEUE_DISPATCH: &str = "dispatch";
/// Queue holding per-dataset ingestion tasks.
pub const QUEUE_DATASETS: &str = "datasets";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    IngestDataset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub attempts: u32,
}

impl Task {
    pub fn ingest(pid: &str) -> Self {
        Self {
            kind: TaskKind::IngestDataset,
            payload: serde_json::json!({ "identifier": pid }),
            attempts: 0,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.payload.get("identifier").and_then(|v| v.as_str())
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, queue: &str, task: Task) -> Result<()>;
    async fn dequeue(&self, queue: &str) -> Result<Option<Task>>;
    async fn depth(&self, queue: &str) -> Result<usize>;
}

/// In-process queue for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<Task>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, queue: &str, task: Task) -> Result<()> {
        self.queues
            .lock()
            .unwrap()
            .entry(queue.to_string())
            .or_default()
            .push_back(task);
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<Task>> {
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get_mut(queue)
            .and_then(VecDeque::pop_front))
    }

    async fn depth(&self, queue: &str) -> Result<usize> {
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get(queue)
            .map_or(0, VecDeque::len))
    }
}

/// Durable queue backed by SQLite; tasks survive process restarts.
pub struct SqliteQueue {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteQueue {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS jobs_queue ON jobs(queue, id);",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl JobQueue for SqliteQueue {
    async fn enqueue(&self, queue: &str, task: Task) -> Result<()> {
        let body = serde_json::to_string(&task)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO jobs (queue, body) VALUES (?1, ?2)",
            params![queue, body],
        )?;
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<Task>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, body FROM jobs WHERE queue = ?1 ORDER BY id LIMIT 1",
                params![queue],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        match row {
            Some((id, body)) => {
                conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn depth(&self, queue: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE queue = ?1",
            params![queue],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
