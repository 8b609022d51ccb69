use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphStoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("failed to parse store response: {reason}")]
    Parse { reason: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

pub type Result<T> = std::result::Result<T, GraphStoreError>;
