//! Helpers shared by the services.

use common::DocumentId;
use doc_store::{Document, DocumentStore, WriteOptions};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{DomainError, Result};

/// Parses a caller-supplied identifier, naming the parameter on failure.
pub fn parse_id(name: &str, raw: &str) -> Result<DocumentId> {
    DocumentId::parse(raw).map_err(|_| DomainError::validation(format!("Invalid {name}")))
}

/// Trims `value`, rejecting blank input with `message`.
pub fn required(value: &str, message: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(DomainError::validation(message))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Trims an optional value, treating blank input as absent.
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Fails with `Forbidden` unless `caller` is `owner`.
pub fn ensure_owner(owner: DocumentId, caller: DocumentId, message: &str) -> Result<()> {
    if owner == caller {
        Ok(())
    } else {
        Err(DomainError::forbidden(message))
    }
}

/// Loads and deserializes a document, failing with `NotFound` when absent.
pub async fn load<S, T>(
    store: &S,
    collection: &str,
    id: DocumentId,
    entity: &'static str,
) -> Result<T>
where
    S: DocumentStore + ?Sized,
    T: DeserializeOwned,
{
    let doc = store
        .find_by_id(collection, id)
        .await?
        .ok_or(DomainError::not_found(entity))?;
    Ok(doc.into_typed()?)
}

/// Inserts a new entity and reads back the stored form.
pub async fn insert<S, N, T>(
    store: &S,
    collection: &str,
    new: &N,
    options: WriteOptions,
) -> Result<T>
where
    S: DocumentStore + ?Sized,
    N: Serialize + Sync,
    T: DeserializeOwned,
{
    let doc = Document::from_serializable(new)?;
    let saved = store.insert(collection, doc, options).await?;
    Ok(saved.into_typed()?)
}
