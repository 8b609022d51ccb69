//! Ingestion worker: drains dataset tasks through the synchronizer.

use std::sync::Arc;

use crate::errors::Result;
use crate::queue::{JobQueue, Task, QUEUE_DATASETS};
use crate::sync::DatasetSynchronizer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    Completed { pid: String, statements: usize },
    /// Transient failure, task re-enqueued for another attempt.
    Requeued { pid: String },
    /// Permanent failure or attempt cap reached; surfaced and dropped.
    Dropped { pid: String },
}

pub struct IngestWorker {
    queue: Arc<dyn JobQueue>,
    synchronizer: Arc<DatasetSynchronizer>,
    max_attempts: u32,
}

impl IngestWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        synchronizer: Arc<DatasetSynchronizer>,
        max_attempts: u32,
    ) -> Self {
        Self {
            queue,
            synchronizer,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Processes at most one task. `Ok(None)` means the queue was empty.
    pub async fn run_once(&self) -> Result<Option<WorkOutcome>> {
        let Some(task) = self.queue.dequeue(QUEUE_DATASETS).await? else {
            return Ok(None);
        };
        let Some(pid) = task.identifier().map(str::to_string) else {
            log::error!("dropping malformed task without identifier: {:?}", task.payload);
            return Ok(Some(WorkOutcome::Dropped {
                pid: String::new(),
            }));
        };

        match self.synchronizer.sync(&pid).await {
            Ok(outcome) => Ok(Some(WorkOutcome::Completed {
                pid,
                statements: outcome.statements,
            })),
            Err(err) if err.is_permanent() => {
                log::error!("{err}");
                Ok(Some(WorkOutcome::Dropped { pid }))
            }
            Err(err) => {
                let attempts = task.attempts + 1;
                if attempts < self.max_attempts {
                    log::warn!("{err}; requeueing attempt {attempts}");
                    self.queue
                        .enqueue(
                            QUEUE_DATASETS,
                            Task {
                                attempts,
                                ..task
                            },
                        )
                        .await?;
                    Ok(Some(WorkOutcome::Requeued { pid }))
                } else {
                    log::error!("{err}; giving up after {attempts} attempts");
                    Ok(Some(WorkOutcome::Dropped { pid }))
                }
            }
        }
    }
}
