use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    DocStoreError, Document, DocumentId, Filter, ID_FIELD, Pipeline, Result,
    eval::{Source, execute},
    id_value,
    store::{
        Cascade, Changes, DocumentStore, Toggled, WriteOptions, find_unique_violation,
        prepare_insert, validate_toggle_key,
    },
};

#[derive(Default)]
struct State {
    collections: HashMap<String, Vec<Document>>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl State {
    /// Returns a timestamp strictly greater than any handed out before, so
    /// that `createdAt` ordering always matches insertion order.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(next);
        next
    }

    fn collection_mut(&mut self, name: &str) -> &mut Vec<Document> {
        self.collections.entry(name.to_string()).or_default()
    }

    fn apply_cascade(&mut self, parent: &Value, rules: &[Cascade], now: DateTime<Utc>) {
        for rule in rules {
            match rule {
                Cascade::Delete {
                    collection,
                    field,
                    then,
                } => {
                    let matcher = Filter::new().eq(field.clone(), parent.clone());
                    let docs = std::mem::take(self.collection_mut(collection));
                    let (removed, kept): (Vec<_>, Vec<_>) =
                        docs.into_iter().partition(|d| matcher.matches(d));
                    *self.collection_mut(collection) = kept;

                    for doc in removed {
                        if let Some(id) = doc.get(ID_FIELD) {
                            self.apply_cascade(id, then, now);
                        }
                    }
                }
                Cascade::Pull { collection, field } => {
                    let matcher = Filter::new().eq(field.clone(), parent.clone());
                    let changes = Changes::new().pull(field.clone(), parent.clone());
                    for doc in self.collection_mut(collection).iter_mut() {
                        if matcher.matches(doc) {
                            changes.apply(doc, now);
                        }
                    }
                }
            }
        }
    }
}

/// In-memory document store implementation.
///
/// Every write holds a single store-wide lock, which makes toggles, unique
/// inserts and cascades atomic. Used by tests and by the development server
/// when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn collection_len(&self, collection: &str) -> usize {
        self.state
            .read()
            .await
            .collections
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Removes every document from every collection.
    pub async fn clear(&self) {
        self.state.write().await.collections.clear();
    }
}

#[async_trait]
impl Source for InMemoryDocumentStore {
    async fn fetch(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(
        &self,
        collection: &str,
        doc: Document,
        options: WriteOptions,
    ) -> Result<Document> {
        let mut state = self.state.write().await;
        let now = state.tick();
        let doc = prepare_insert(doc, now);

        let docs = state.collection_mut(collection);
        if let Some(field) = find_unique_violation(&doc, &options.unique_fields, docs.iter()) {
            return Err(DocStoreError::DuplicateKey {
                collection: collection.to_string(),
                field,
            });
        }

        docs.push(doc.clone());
        Ok(doc)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        self.fetch(collection, filter).await
    }

    async fn find_by_id(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id() == Some(id)))
            .cloned())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let state = self.state.read().await;
        let count = state
            .collections
            .get(collection)
            .map_or(0, |docs| docs.iter().filter(|d| filter.matches(d)).count());
        Ok(count as u64)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: DocumentId,
        changes: &Changes,
        options: WriteOptions,
    ) -> Result<Option<Document>> {
        let mut state = self.state.write().await;
        let now = state.tick();
        let docs = state.collection_mut(collection);

        let Some(index) = docs.iter().position(|d| d.id() == Some(id)) else {
            return Ok(None);
        };

        let mut updated = docs[index].clone();
        changes.apply(&mut updated, now);

        if let Some(field) = find_unique_violation(&updated, &options.unique_fields, docs.iter()) {
            return Err(DocStoreError::DuplicateKey {
                collection: collection.to_string(),
                field,
            });
        }

        docs[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> Result<bool> {
        let mut state = self.state.write().await;
        let docs = state.collection_mut(collection);
        let before = docs.len();
        docs.retain(|d| d.id() != Some(id));
        Ok(docs.len() != before)
    }

    async fn delete_cascade(
        &self,
        collection: &str,
        id: DocumentId,
        rules: &[Cascade],
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let now = state.tick();
        let docs = state.collection_mut(collection);
        let before = docs.len();
        docs.retain(|d| d.id() != Some(id));
        if docs.len() == before {
            return Ok(false);
        }

        state.apply_cascade(&id_value(id), rules, now);
        Ok(true)
    }

    async fn toggle(&self, collection: &str, key: &Filter) -> Result<Toggled> {
        validate_toggle_key(key)?;

        let mut state = self.state.write().await;
        let now = state.tick();
        let docs = state.collection_mut(collection);

        if let Some(index) = docs.iter().position(|d| key.matches(d)) {
            let removed = docs.remove(index);
            return Ok(Toggled::Removed(removed));
        }

        let doc = prepare_insert(key.to_document(), now);
        docs.push(doc.clone());
        Ok(Toggled::Added(doc))
    }

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Document>> {
        execute(self, collection, pipeline).await
    }
}
