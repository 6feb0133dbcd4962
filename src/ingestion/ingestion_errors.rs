use thiserror::Error;

/// Custom error type for upstream transaction sources and normalization
#[derive(Debug, Error)]
pub enum SourceError {
    /// True transport/auth failure. "No data" is an empty list, never this.
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// A raw record that does not map cleanly onto a cashflow event.
    #[error("Record rejected: {0}")]
    InvalidRecord(String),

    #[error("Source call timed out after {0:?}")]
    TimedOut(std::time::Duration),
}
