use common::DocumentId;
use doc_store::{DocumentStore, DocumentStoreExt, Filter, id_value};

use crate::error::{DomainError, Result};
use crate::model::collections;

/// Service for toggling channel subscriptions.
pub struct SubscriptionService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> SubscriptionService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Subscribes the caller to a channel, or unsubscribes if already
    /// subscribed. Returns true when subscribed afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn toggle(&self, subscriber: DocumentId, channel: DocumentId) -> Result<bool> {
        if !self.store.exists(collections::ACCOUNTS, channel).await? {
            return Err(DomainError::not_found("Channel"));
        }

        let key = Filter::new()
            .eq("subscriber", id_value(subscriber))
            .eq("channel", id_value(channel));
        let subscribed = self
            .store
            .toggle(collections::SUBSCRIPTIONS, &key)
            .await?
            .is_added();

        metrics::counter!("subscriptions_toggled_total").increment(1);
        Ok(subscribed)
    }
}

#[cfg(test)]
mod tests {
    use doc_store::{Document, InMemoryDocumentStore, WriteOptions};
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn subscription_is_unique_per_pair() {
        let store = InMemoryDocumentStore::new();
        let channel = store
            .insert(
                collections::ACCOUNTS,
                Document::from_value(json!({"username": "chan"})).unwrap(),
                WriteOptions::new(),
            )
            .await
            .unwrap()
            .id()
            .unwrap();
        let service = SubscriptionService::new(store.clone());
        let a = DocumentId::new();
        let b = DocumentId::new();

        assert!(service.toggle(a, channel).await.unwrap());
        assert!(service.toggle(b, channel).await.unwrap());
        assert!(!service.toggle(a, channel).await.unwrap());

        let remaining = store
            .find(collections::SUBSCRIPTIONS, &Filter::new())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].get("subscriber"), Some(&id_value(b)));
    }

    #[tokio::test]
    async fn unknown_channel_is_not_found() {
        let service = SubscriptionService::new(InMemoryDocumentStore::new());
        assert!(matches!(
            service.toggle(DocumentId::new(), DocumentId::new()).await,
            Err(DomainError::NotFound { entity: "Channel" })
        ));
    }
}
