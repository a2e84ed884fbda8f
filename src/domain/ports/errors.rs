use thiserror::Error;

/// Store access errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Write rejected by {table}: {reason}")]
    Rejected { table: String, reason: String },

    #[error("Failed to decode {table} entry {key}: {reason}")]
    Decode {
        table: String,
        key: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for store port calls.
pub type StoreResult<T> = Result<T, StoreError>;
