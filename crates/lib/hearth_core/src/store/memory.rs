//! In-memory document store.
//!
//! Keeps every collection in a single map behind one `RwLock`. Writers take
//! the lock exclusively, which makes [`DocumentStore::read_modify_write`]
//! atomic with respect to every other operation.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{Document, DocumentStore, Filter, Mutation, StoreError, StoreResult};
use crate::uuid::uuidv7;

type Collection = BTreeMap<String, Value>;

/// Process-local document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn add(&self, collection: &str, data: Value) -> StoreResult<String> {
        let id = uuidv7().to_string();
        self.set(collection, &id, data).await?;
        Ok(id)
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Ok(false);
        }
        docs.insert(id.to_string(), data);
        Ok(true)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections.get_mut(collection).and_then(|d| d.get_mut(id)) else {
            return Ok(false);
        };
        let Value::Object(existing) = doc else {
            return Err(StoreError::Corrupt(format!(
                "{collection}/{id} is not a JSON object"
            )));
        };
        existing.extend(fields);
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|(_, data)| filter.matches(data))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map(|docs| docs.values().filter(|data| filter.matches(data)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn read_modify_write(
        &self,
        collection: &str,
        id: &str,
        mutate: Mutation,
    ) -> StoreResult<Option<Value>> {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections.get_mut(collection).and_then(|d| d.get_mut(id)) else {
            return Ok(None);
        };
        let before = doc.clone();
        if let Some(next) = mutate(&before) {
            *doc = next;
        }
        Ok(Some(before))
    }
}
