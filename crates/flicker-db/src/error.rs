use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No live record under any known key. Callers holding a snapshot should
    /// retry with it so the store can rebuild the record.
    #[error("story {0} not found")]
    NotFound(String),

    /// Rejected input; retrying the same request will not help.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Every compare-and-swap attempt lost to a concurrent writer.
    #[error("concurrent update on {key} after {attempts} attempts")]
    Conflict { key: String, attempts: u32 },

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DB lock poisoned: {0}")]
    Poisoned(String),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
