use thiserror::Error;

use crate::sync::SyncStage;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("graph store error: {0}")]
    Store(#[from] lodgraph::error::GraphStoreError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed metadata document: {0}")]
    MalformedDocument(String),

    #[error("unsupported format identifier: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported checksum algorithm: {0}")]
    UnsupportedChecksum(String),

    #[error("SQLite operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("synchronization of {pid} failed at {stage}: {source}")]
    Sync {
        pid: String,
        stage: SyncStage,
        #[source]
        source: Box<IngestError>,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// True for malformed-input failures that retrying cannot fix; the job
    /// is surfaced to the operator instead of being requeued.
    pub fn is_permanent(&self) -> bool {
        match self {
            IngestError::Xml(_)
            | IngestError::MalformedDocument(_)
            | IngestError::UnsupportedFormat(_)
            | IngestError::UnsupportedChecksum(_) => true,
            IngestError::Sync { source, .. } => source.is_permanent(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
