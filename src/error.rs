//! Error handling

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced alert/operator does not exist. Surfaced to the caller.
    #[error("{0} not found")]
    NotFound(String),

    /// Store unreachable or collaborator timed out. Logged, loops continue.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Historical record that no longer parses. Skipped, never fatal.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
