use thiserror::Error;

/// Errors surfaced by [`crate::store::RecordStore`] operations.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate record id: {0}")]
    DuplicateId(String),

    #[error("serialize records: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Backend read/write failures.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;
