//! Errors surfaced by span operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Span result type
pub type SpanResult<T> = Result<T, SpanError>;

/// Errors from span naming and recency updates.
///
/// A file name that is not a cache entry is never an error; decoding reports
/// it as `None`.
#[derive(Debug, Error)]
pub enum SpanError {
    #[error("span is not cached")]
    NotCached,

    #[error("cache key must not be empty")]
    EmptyKey,

    #[error("failed to rename {} to {}: {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SpanError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rename { .. })
    }
}
