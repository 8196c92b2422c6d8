use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a stored document.
///
/// Wraps a UUID so that identifiers are compared by value everywhere
/// (ownership checks, membership tests) and never by string accident.
/// Serialized as its hyphenated string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

/// Returned when a string is not a syntactically valid [`DocumentId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid identifier")]
pub struct InvalidDocumentId(pub String);

impl DocumentId {
    /// Creates a new random document ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a document ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses an identifier received from the wire.
    ///
    /// This is a purely syntactic check; it says nothing about whether a
    /// document with this ID exists.
    pub fn parse(raw: &str) -> Result<Self, InvalidDocumentId> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| InvalidDocumentId(raw.to_string()))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = InvalidDocumentId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for DocumentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<DocumentId> for Uuid {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}
