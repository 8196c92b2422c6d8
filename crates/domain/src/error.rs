//! Domain error types.

use doc_store::DocStoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// Each variant corresponds to one response class of the HTTP surface.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input, including identifiers that fail to parse.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// The caller is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller is authenticated but does not own the resource.
    #[error("{0}")]
    Forbidden(String),

    /// A uniqueness invariant would be violated.
    #[error("{0}")]
    Conflict(String),

    /// A collaborator (asset host, hasher) failed.
    #[error("{0}")]
    Infrastructure(String),

    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(DocStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure(message.into())
    }
}

impl From<DocStoreError> for DomainError {
    fn from(err: DocStoreError) -> Self {
        match err {
            DocStoreError::DuplicateKey { field, .. } => {
                DomainError::Conflict(format!("This {field} already exists"))
            }
            other => DomainError::Store(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
