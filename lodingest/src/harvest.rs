//! Harvest loop: discovers new and changed records and fans them out as
//! ingestion tasks.
//!
//! The loop owns the durable cursor exclusively. A tick never fails hard:
//! per-identifier enqueue errors are logged and the rest of the batch
//! proceeds. The cursor reflects discovery, not completion, of ingestion.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::catalog::{CatalogClient, SearchQuery};
use crate::cursor::{CursorStore, EPOCH_CURSOR};
use crate::errors::{IngestError, Result};
use crate::queue::{JobQueue, Task, QUEUE_DATASETS, QUEUE_DISPATCH};

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Maximum records discovered per tick.
    pub batch_size: usize,
    /// Dataset-queue depth at which the tick backs off entirely.
    pub backoff_threshold: usize,
    /// Page size for catalog search requests.
    pub page_size: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            backoff_threshold: 2500,
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A previous sweep is still draining the dispatch queue.
    SkippedDispatchBusy,
    /// The dataset queue is at or above the backoff threshold.
    SkippedBackpressure,
    Harvested { enqueued: usize, failed: usize },
}

#[derive(Debug)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Cursor value after the tick.
    pub cursor: String,
}

pub struct HarvestLoop {
    catalog: Arc<dyn CatalogClient>,
    queue: Arc<dyn JobQueue>,
    cursor: Arc<dyn CursorStore>,
    config: HarvestConfig,
}

impl HarvestLoop {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        queue: Arc<dyn JobQueue>,
        cursor: Arc<dyn CursorStore>,
        config: HarvestConfig,
    ) -> Self {
        Self {
            catalog,
            queue,
            cursor,
            config,
        }
    }

    /// One harvest tick over the window `(cursor, now]`.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let cursor_value = self
            .cursor
            .get()
            .await?
            .unwrap_or_else(|| EPOCH_CURSOR.to_string());

        if self.queue.depth(QUEUE_DISPATCH).await? > 0 {
            log::debug!("dispatch queue non-empty, skipping tick");
            return Ok(TickReport {
                outcome: TickOutcome::SkippedDispatchBusy,
                cursor: cursor_value,
            });
        }

        let depth = self.queue.depth(QUEUE_DATASETS).await?;
        if depth >= self.config.backoff_threshold {
            log::info!(
                "dataset queue depth {depth} at or above threshold {}, backing off",
                self.config.backoff_threshold
            );
            return Ok(TickReport {
                outcome: TickOutcome::SkippedBackpressure,
                cursor: cursor_value,
            });
        }

        let modified_after = DateTime::parse_from_rfc3339(&cursor_value)
            .map_err(|e| IngestError::Internal(format!("invalid cursor '{cursor_value}': {e}")))?
            .with_timezone(&Utc);

        let records = self.discover(modified_after, now).await?;

        let mut enqueued = 0usize;
        let mut failed = 0usize;
        // the cursor only advances through the prefix that enqueued
        // cleanly; anything at or after the first failure is rediscovered
        let mut advance_to: Option<DateTime<Utc>> = None;
        for record in &records {
            match self
                .queue
                .enqueue(QUEUE_DATASETS, Task::ingest(&record.identifier))
                .await
            {
                Ok(()) => {
                    enqueued += 1;
                    if failed == 0 {
                        advance_to = Some(record.date_modified);
                    }
                }
                Err(err) => {
                    failed += 1;
                    log::warn!("failed to enqueue {}: {err}", record.identifier);
                }
            }
        }

        let mut cursor_after = cursor_value;
        if let Some(latest) = advance_to {
            let formatted = latest.to_rfc3339_opts(SecondsFormat::Secs, true);
            if latest > modified_after {
                self.cursor.set(&formatted).await?;
                cursor_after = formatted;
            }
        }

        if enqueued > 0 || failed > 0 {
            log::info!("harvest tick enqueued {enqueued} tasks ({failed} failures)");
        }
        Ok(TickReport {
            outcome: TickOutcome::Harvested { enqueued, failed },
            cursor: cursor_after,
        })
    }

    /// Pages through the catalog until the batch bound is reached or the
    /// result set is exhausted. Records arrive ascending by modification
    /// time.
    async fn discover(
        &self,
        modified_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<crate::catalog::CatalogRecord>> {
        let mut records = Vec::new();
        let mut page = 0usize;
        loop {
            let result = self
                .catalog
                .search(&SearchQuery {
                    modified_after,
                    modified_before: now,
                    page_size: self.config.page_size,
                    page,
                })
                .await?;
            let exhausted = !result.has_more;
            records.extend(result.records);
            if exhausted || records.len() >= self.config.batch_size {
                break;
            }
            page += 1;
        }
        records.truncate(self.config.batch_size);
        Ok(records)
    }
}
