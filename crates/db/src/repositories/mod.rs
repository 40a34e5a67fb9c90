use thiserror::Error;

use roamcat_core::catalogue::snapshot::StorageError;

pub mod memory;
pub mod snapshot;

pub use memory::InMemorySnapshotRepository;
pub use snapshot::{SnapshotSummary, SqlSnapshotRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
}

impl From<RepositoryError> for StorageError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => Self::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => Self::Decode(message),
            RepositoryError::Encode(message) => Self::Encode(message),
        }
    }
}
