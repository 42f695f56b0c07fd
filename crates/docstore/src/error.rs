use thiserror::Error;

use crate::{DocRef, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum DocStoreError {
    /// A commit-time conflict: a document read by the transaction was
    /// modified (or created/deleted) by a concurrent writer.
    #[error(
        "Write conflict on document {doc}: read version {expected:?}, current version {actual:?}"
    )]
    Conflict {
        doc: DocRef,
        expected: Option<Version>,
        actual: Option<Version>,
    },

    /// A partial update targeted a document that does not exist.
    #[error("Document not found: {0}")]
    NotFound(DocRef),

    /// A partial update payload was not a JSON object.
    #[error("Update payload for {0} must be a JSON object")]
    InvalidUpdate(DocRef),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, DocStoreError>;
