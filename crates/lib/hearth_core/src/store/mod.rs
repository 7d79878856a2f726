//! Document store abstraction.
//!
//! The auth core only needs a handful of document operations: keyed reads and
//! writes, shallow equality queries, and one transactional read-modify-write
//! primitive. [`MemoryStore`] backs tests and single-process deployments;
//! [`PgStore`] keeps documents in a PostgreSQL `jsonb` table.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Document store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt document: {0}")]
    Corrupt(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A stored document together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Transition applied inside [`DocumentStore::read_modify_write`].
///
/// Receives the current document and returns the replacement to write, or
/// `None` to leave the document untouched.
pub type Mutation = Box<dyn FnOnce(&Value) -> Option<Value> + Send>;

/// Shallow equality filter over top-level document fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Map<String, Value>);

impl Filter {
    /// A filter matching every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Whether `doc` satisfies every condition.
    pub fn matches(&self, doc: &Value) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }

    /// The filter as a JSON object (used for `jsonb @>` containment).
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Operations the auth core needs from its backing document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by key.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Insert or replace a document.
    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()>;

    /// Insert a document under a freshly generated key, returning the key.
    async fn add(&self, collection: &str, data: Value) -> StoreResult<String>;

    /// Insert a document only if the key is free. Returns `false` when taken.
    async fn create(&self, collection: &str, id: &str, data: Value) -> StoreResult<bool>;

    /// Merge `fields` into an existing document. Returns `false` if missing.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<bool>;

    /// Delete a document. Returns `false` if it did not exist.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Documents matching `filter`, oldest key first.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Document>>;

    /// Number of documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Atomically read a document and optionally replace it.
    ///
    /// `mutate` runs only when the document exists, while the store holds it
    /// exclusively; no other writer can observe or change the document between
    /// the read and the write. Returns the document as it was before the
    /// mutation, or `None` if it does not exist.
    async fn read_modify_write(
        &self,
        collection: &str,
        id: &str,
        mutate: Mutation,
    ) -> StoreResult<Option<Value>>;
}
