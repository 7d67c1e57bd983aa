use crate::pagination::BlockWindow;
use thiserror::Error;

/// The governing cancellation token fired while waiting for a permit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rate limiter wait aborted: scan cancelled")]
pub struct RateLimitAbort;

/// A single log query failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transport error: {0:#}")]
    Transport(anyhow::Error),

    #[error(transparent)]
    RateLimitAbort(#[from] RateLimitAbort),
}

/// Fatal scan errors.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to fetch logs for blocks {window}: {source}")]
    Fetch {
        window: BlockWindow,
        source: FetchError,
    },

    /// A start-up lookup (chain head, range bounds) failed.
    #[error("chain query failed: {0}")]
    Chain(FetchError),
}

impl ScanError {
    /// First block a follow-up run should start from to cover what this run missed.
    pub fn resume_block(&self) -> Option<u64> {
        match self {
            ScanError::Fetch { window, .. } => Some(window.from_block),
            ScanError::Chain(_) => None,
        }
    }
}

/// A log that matched a known shape but could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedLogError {
    #[error("expected at least {required} topics, got {actual}")]
    TooFewTopics { required: usize, actual: usize },

    #[error("expected at least {required} bytes of data, got {actual}")]
    ShortData { required: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
