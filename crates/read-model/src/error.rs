//! Read model error types.

use doc_store::DocStoreError;
use thiserror::Error;

/// Errors that can occur while composing a read model.
#[derive(Debug, Error)]
pub enum ReadModelError {
    /// A caller-supplied parameter is malformed. Raised before any storage
    /// access.
    #[error("{0}")]
    Validation(String),

    /// The primary entity of the read model does not exist.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] DocStoreError),
}

/// Result type for read model operations.
pub type Result<T> = std::result::Result<T, ReadModelError>;
