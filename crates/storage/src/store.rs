use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Opaque get/put document store over named collections. Strongly consistent
/// for a single key; no schema enforcement beyond what callers apply.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Upserts the document under (collection, key).
    async fn put(&self, collection: &str, key: &str, document: &Value) -> Result<(), StoreError>;

    /// All documents of a collection, in insertion order where the backend
    /// can provide it. Callers needing a specific order sort themselves.
    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError>;
}

/// In-memory store, used in tests and as the no-persistence fallback.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn put(&self, collection: &str, key: &str, document: &Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document.clone());
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("datasets", "transactions").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryStore::new();
        let doc = json!({"records": [1, 2, 3]});
        store.put("datasets", "transactions", &doc).await.unwrap();
        assert_eq!(
            store.get("datasets", "transactions").await.unwrap(),
            Some(doc)
        );
    }

    #[tokio::test]
    async fn put_overwrites_the_same_key() {
        let store = MemoryStore::new();
        store.put("c", "k", &json!(1)).await.unwrap();
        store.put("c", "k", &json!(2)).await.unwrap();
        assert_eq!(store.get("c", "k").await.unwrap(), Some(json!(2)));
        assert_eq!(store.list("c").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn collections_are_independent() {
        let store = MemoryStore::new();
        store.put("a", "k", &json!("in a")).await.unwrap();
        assert!(store.get("b", "k").await.unwrap().is_none());
        assert!(store.list("b").await.unwrap().is_empty());
    }
}
