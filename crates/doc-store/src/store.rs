use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::{
    CREATED_AT, DocStoreError, Document, DocumentId, Filter, ID_FIELD, Pipeline, Result,
    UPDATED_AT, id_value,
};

/// Options for inserting or updating documents.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Fields whose values must be unique within the collection.
    /// The check and the write happen atomically.
    pub unique_fields: Vec<String>,
}

impl WriteOptions {
    /// Creates options with no uniqueness constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options enforcing uniqueness on the given fields.
    pub fn unique_on<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        Self {
            unique_fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// A single field modification.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Sets a path to a value.
    Set(String, Value),
    /// Removes a top-level field.
    Unset(String),
    /// Adds a number to a numeric field (missing counts as 0).
    Inc(String, i64),
    /// Appends to an array field unless the value is already present.
    AddToSet(String, Value),
    /// Removes every occurrence of a value from an array field.
    Pull(String, Value),
    /// Moves or inserts a value at the front of an array field, keeping at
    /// most `max_len` elements.
    PushFront {
        field: String,
        value: Value,
        max_len: Option<usize>,
    },
}

/// An ordered list of modifications applied to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    ops: Vec<UpdateOp>,
}

impl Changes {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(field.into(), value.into()));
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(field.into()));
        self
    }

    pub fn inc(mut self, field: impl Into<String>, by: i64) -> Self {
        self.ops.push(UpdateOp::Inc(field.into(), by));
        self
    }

    pub fn add_to_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::AddToSet(field.into(), value.into()));
        self
    }

    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Pull(field.into(), value.into()));
        self
    }

    pub fn push_front(
        mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
        max_len: Option<usize>,
    ) -> Self {
        self.ops.push(UpdateOp::PushFront {
            field: field.into(),
            value: value.into(),
            max_len,
        });
        self
    }

    /// Returns true if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Applies every operation in order and stamps `updatedAt`.
    pub fn apply(&self, doc: &mut Document, now: DateTime<Utc>) {
        for op in &self.ops {
            match op {
                UpdateOp::Set(field, value) => doc.set_path(field, value.clone()),
                UpdateOp::Unset(field) => {
                    doc.remove(field);
                }
                UpdateOp::Inc(field, by) => {
                    let current = doc.get_path(field).and_then(Value::as_i64).unwrap_or(0);
                    doc.set_path(field, Value::from(current + by));
                }
                UpdateOp::AddToSet(field, value) => {
                    let mut items = array_field(doc, field);
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                    doc.set_path(field, Value::Array(items));
                }
                UpdateOp::Pull(field, value) => {
                    let mut items = array_field(doc, field);
                    items.retain(|item| item != value);
                    doc.set_path(field, Value::Array(items));
                }
                UpdateOp::PushFront {
                    field,
                    value,
                    max_len,
                } => {
                    let mut items = array_field(doc, field);
                    items.retain(|item| item != value);
                    items.insert(0, value.clone());
                    if let Some(max) = max_len {
                        items.truncate(*max);
                    }
                    doc.set_path(field, Value::Array(items));
                }
            }
        }
        doc.set(UPDATED_AT, timestamp_value(now));
    }
}

fn array_field(doc: &Document, field: &str) -> Vec<Value> {
    doc.get_path(field)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Dependent documents removed (or detached) together with a parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Cascade {
    /// Deletes documents of `collection` whose `field` references the
    /// parent, then applies `then` to each deleted document.
    Delete {
        collection: String,
        field: String,
        then: Vec<Cascade>,
    },
    /// Removes the parent's ID from the array `field` of every document in
    /// `collection`.
    Pull { collection: String, field: String },
}

impl Cascade {
    pub fn delete(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Cascade::Delete {
            collection: collection.into(),
            field: field.into(),
            then: Vec::new(),
        }
    }

    pub fn pull(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Cascade::Pull {
            collection: collection.into(),
            field: field.into(),
        }
    }

    /// Adds a nested cascade applied to each document this rule deletes.
    /// Has no effect on [`Cascade::Pull`].
    pub fn then(mut self, rule: Cascade) -> Self {
        if let Cascade::Delete { then, .. } = &mut self {
            then.push(rule);
        }
        self
    }
}

/// Outcome of a toggle.
#[derive(Debug, Clone, PartialEq)]
pub enum Toggled {
    /// No document matched the key, so one was inserted.
    Added(Document),
    /// A document matched the key and was removed.
    Removed(Document),
}

impl Toggled {
    /// Returns true if the toggle inserted a document.
    pub fn is_added(&self) -> bool {
        matches!(self, Toggled::Added(_))
    }
}

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync). Every method is a
/// single atomic operation from the caller's point of view.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document, assigning `_id` (unless present), `createdAt` and
    /// `updatedAt`.
    ///
    /// Fails with `DuplicateKey` if a unique field collides.
    async fn insert(
        &self,
        collection: &str,
        doc: Document,
        options: WriteOptions,
    ) -> Result<Document>;

    /// Returns all documents matching an exact-match filter, in insertion
    /// order.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;

    /// Returns the document with the given ID.
    async fn find_by_id(&self, collection: &str, id: DocumentId) -> Result<Option<Document>>;

    /// Counts documents matching a filter.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Applies changes to one document and returns its new state.
    ///
    /// Returns `None` if the document does not exist.
    async fn update_by_id(
        &self,
        collection: &str,
        id: DocumentId,
        changes: &Changes,
        options: WriteOptions,
    ) -> Result<Option<Document>>;

    /// Deletes one document. Returns true if it existed.
    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> Result<bool>;

    /// Deletes one document together with its dependents.
    ///
    /// Returns false (and touches nothing) if the document does not exist.
    async fn delete_cascade(
        &self,
        collection: &str,
        id: DocumentId,
        rules: &[Cascade],
    ) -> Result<bool>;

    /// Atomically removes the document matching `key` if there is one, or
    /// inserts one built from the key's fields otherwise.
    ///
    /// `key` must consist of equality clauses only.
    async fn toggle(&self, collection: &str, key: &Filter) -> Result<Toggled>;

    /// Runs an aggregation pipeline over a collection.
    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Document>>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Returns the first document matching a filter.
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    /// Checks whether a document with the given ID exists.
    async fn exists(&self, collection: &str, id: DocumentId) -> Result<bool> {
        Ok(self.find_by_id(collection, id).await?.is_some())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// Serializes a timestamp the way documents store it.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Fills in the store-managed fields of a new document.
pub fn prepare_insert(mut doc: Document, now: DateTime<Utc>) -> Document {
    if doc.id().is_none() {
        doc.set(ID_FIELD, id_value(DocumentId::new()));
    }
    doc.set(CREATED_AT, timestamp_value(now));
    doc.set(UPDATED_AT, timestamp_value(now));
    doc
}

/// Rejects toggle keys that are not pure equality filters.
pub fn validate_toggle_key(key: &Filter) -> Result<()> {
    if key.is_exact_key() {
        Ok(())
    } else {
        Err(DocStoreError::InvalidKey(
            "toggle key must consist of equality clauses only".to_string(),
        ))
    }
}

/// Finds the first unique field of `doc` that collides with another
/// document (one with a different ID) among `existing`.
pub fn find_unique_violation<'a, I>(doc: &Document, fields: &[String], existing: I) -> Option<String>
where
    I: IntoIterator<Item = &'a Document>,
{
    let own_id = doc.id();
    let existing: Vec<&Document> = existing.into_iter().filter(|d| d.id() != own_id).collect();
    fields
        .iter()
        .find(|field| {
            doc.get_path(field).is_some_and(|value| {
                !value.is_null() && existing.iter().any(|other| other.get_path(field) == Some(value))
            })
        })
        .cloned()
}
