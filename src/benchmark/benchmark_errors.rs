use diesel::result::Error as DieselError;
use thiserror::Error;

/// Custom error type for benchmark state operations
#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("No benchmark state for account {0}")]
    NotInitialized(String),

    #[error("Benchmark state already exists for account {0}")]
    AlreadyInitialized(String),

    #[error("Concurrent update conflict for account {0}")]
    PersistenceConflict(String),

    #[error("Invalid price input: {0}")]
    InvalidPrice(String),

    #[error("Invalid target weights: {0}")]
    InvalidWeights(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DieselError> for BenchmarkError {
    fn from(err: DieselError) -> Self {
        BenchmarkError::DatabaseError(err.to_string())
    }
}
