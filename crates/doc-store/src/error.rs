use thiserror::Error;

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum DocStoreError {
    /// A write would break a uniqueness constraint on a field.
    #[error("Duplicate value for unique field '{field}' in collection '{collection}'")]
    DuplicateKey { collection: String, field: String },

    /// A value that should have been a JSON object was not.
    #[error("Document must be a JSON object")]
    NotAnObject,

    /// A keyed operation received a filter that is not a pure key.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The pipeline is structurally invalid and was not executed.
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

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
