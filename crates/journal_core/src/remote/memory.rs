//! In-process document store.
//!
//! Keeps every collection in insertion order behind a [`RwLock`]. Reads and
//! writes can be made to fail independently, which is how the stores'
//! recovery paths are exercised in tests.

use super::{Document, DocumentStore};
use crate::error::AppError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    next_id: AtomicU64,
    writes: AtomicUsize,
    reject_reads: AtomicBool,
    reject_writes: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later read fail (or succeed again).
    pub fn set_reject_reads(&self, reject: bool) {
        self.reject_reads.store(reject, Ordering::SeqCst);
    }

    /// Makes every later add, update and delete fail (or succeed again).
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Number of write attempts that reached the store, rejected ones included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn get(&self, collection: &str, id: &str) -> Option<Document> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|doc| doc.id == id))
            .cloned()
    }

    /// Inserts a document from a JSON object without counting it as a write.
    pub async fn seed(&self, collection: &str, fields: Value) -> Result<String, AppError> {
        let Value::Object(fields) = fields else {
            return Err(AppError::invalid_data("document fields must be an object"));
        };
        Ok(self.insert(collection, fields).await)
    }

    async fn insert(&self, collection: &str, fields: Map<String, Value>) -> String {
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(Document {
                id: id.clone(),
                fields,
            });
        id
    }

    fn check_read(&self) -> Result<(), AppError> {
        if self.reject_reads.load(Ordering::SeqCst) {
            return Err(AppError::remote("document store unavailable"));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(AppError::remote("document store rejected the write"));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, AppError> {
        self.check_read()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|doc| doc.fields.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        self.check_read()?;
        let collections = self.collections.read().await;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn add(&self, collection: &str, fields: Map<String, Value>) -> Result<String, AppError> {
        self.check_write()?;
        Ok(self.insert(collection, fields).await)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        self.check_write()?;
        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| AppError::remote(format!("no document {collection}/{id}")))?;
        document.fields = fields;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.check_write()?;
        let mut collections = self.collections.write().await;
        if let Some(documents) = collections.get_mut(collection) {
            documents.retain(|doc| doc.id != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryDocumentStore;
    use crate::remote::DocumentStore;
    use serde_json::{Map, Value, json};

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[tokio::test]
    async fn query_eq_filters_by_field() {
        let store = MemoryDocumentStore::new();
        store.seed("tasks", json!({ "userId": "a", "title": "one" })).await.unwrap();
        store.seed("tasks", json!({ "userId": "b", "title": "two" })).await.unwrap();
        store.seed("tasks", json!({ "userId": "a", "title": "three" })).await.unwrap();

        let docs = store.query_eq("tasks", "userId", &json!("a")).await.unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].fields["title"], "one");
        assert_eq!(docs[1].fields["title"], "three");
        assert_eq!(store.get_all("tasks").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn update_replaces_all_fields() {
        let store = MemoryDocumentStore::new();
        let id = store
            .add("goals", fields(json!({ "title": "old", "extra": true })))
            .await
            .unwrap();

        store
            .update("goals", &id, fields(json!({ "title": "new" })))
            .await
            .unwrap();

        let doc = store.get("goals", &id).await.unwrap();
        assert_eq!(doc.fields["title"], "new");
        assert!(doc.fields.get("extra").is_none());
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = MemoryDocumentStore::new();
        let err = store
            .update("goals", "nope", Map::new())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "remote_failed");
    }

    #[tokio::test]
    async fn rejected_writes_are_counted() {
        let store = MemoryDocumentStore::new();
        store.set_reject_writes(true);

        let err = store.add("tasks", Map::new()).await.unwrap_err();

        assert_eq!(err.code(), "remote_failed");
        assert_eq!(store.write_count(), 1);
        assert!(store.get_all("tasks").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_reads_fail_queries() {
        let store = MemoryDocumentStore::new();
        store.set_reject_reads(true);

        assert!(store.get_all("tasks").await.is_err());
        assert!(store.query_eq("tasks", "userId", &json!("a")).await.is_err());
    }
}
