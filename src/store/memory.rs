use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::embedding::{cosine_distance, embed};
use super::{SearchHit, StoreError, VectorStore};

pub const DEFAULT_DIMENSIONS: usize = 256;

#[derive(Debug)]
struct Record {
    id: String,
    document: String,
    metadata: Map<String, Value>,
    embedding: Vec<f32>,
}

#[derive(Debug, Default)]
struct Collection {
    records: Vec<Record>,
}

/// Collections of embedded documents kept in process memory.
#[derive(Debug)]
pub struct MemoryVectorStore {
    dimensions: usize,
    collections: RwLock<HashMap<String, Collection>>,
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

fn check_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidArgument("collection name must not be empty".into()));
    }
    Ok(())
}

impl MemoryVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Collection>> {
        self.collections.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Collection>> {
        self.collections.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of documents stored in `name`, if it exists.
    pub fn count(&self, name: &str) -> Option<usize> {
        self.read().get(name).map(|c| c.records.len())
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        check_name(name)?;
        let mut collections = self.write();
        if collections.contains_key(name) {
            warn!(target: "store", collection = %name, "Collection already exists");
            return Ok(());
        }
        collections.insert(name.to_string(), Collection::default());
        info!(target: "store", collection = %name, "Created collection");
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.read().contains_key(name))
    }

    async fn add_dictionary(&self, name: &str, documents: &[(String, String)]) -> Result<usize, StoreError> {
        check_name(name)?;
        let records: Vec<Record> = documents
            .iter()
            .map(|(key, text)| {
                let mut metadata = Map::new();
                metadata.insert("source".into(), Value::String(key.clone()));
                Record {
                    id: Uuid::new_v4().to_string(),
                    document: text.clone(),
                    metadata,
                    embedding: embed(text, self.dimensions),
                }
            })
            .collect();

        let added = records.len();
        self.write()
            .entry(name.to_string())
            .or_default()
            .records
            .extend(records);
        info!(target: "store", collection = %name, added, "Added items to collection");
        Ok(added)
    }

    async fn search(&self, query: &str, n_results: usize, name: &str) -> Result<Vec<SearchHit>, StoreError> {
        if n_results == 0 {
            return Err(StoreError::InvalidArgument("n_results must be at least 1".into()));
        }

        let collections = self.read();
        if collections.is_empty() {
            warn!(target: "store", "No collections available to search");
            return Ok(Vec::new());
        }
        let collection = collections
            .get(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;

        let query_embedding = embed(query, self.dimensions);
        let mut scored: Vec<(f32, &Record)> = collection
            .records
            .iter()
            .map(|record| (cosine_distance(&query_embedding, &record.embedding), record))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(n_results);

        Ok(scored
            .into_iter()
            .map(|(distance, record)| SearchHit {
                id: record.id.clone(),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
                distance: Some(distance),
            })
            .collect())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        let removed = self.write().remove(name).is_some();
        if removed {
            info!(target: "store", collection = %name, "Deleted collection");
        } else {
            warn!(target: "store", collection = %name, "Collection does not exist");
        }
        Ok(removed)
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let store = MemoryVectorStore::default();
        store.create_collection("c").await.unwrap();
        store.add_dictionary("c", &docs(&[("k", "text")])).await.unwrap();
        store.create_collection("c").await.unwrap();
        assert_eq!(store.count("c"), Some(1));
    }

    #[tokio::test]
    async fn add_creates_missing_collection_and_records_source() {
        let store = MemoryVectorStore::default();
        let added = store
            .add_dictionary("fresh", &docs(&[("doc1", "alpha beta")]))
            .await
            .unwrap();
        assert_eq!(added, 1);

        let hits = store.search("alpha", 5, "fresh").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.get("source"), Some(&Value::from("doc1")));
    }

    #[tokio::test]
    async fn search_orders_by_distance_and_truncates() {
        let store = MemoryVectorStore::default();
        store
            .add_dictionary(
                "c",
                &docs(&[
                    ("doc1", "This is a test document about artificial intelligence."),
                    ("doc2", "Vector databases are useful for semantic search."),
                    ("doc3", "ChromaDB is a vector database for AI applications."),
                ]),
            )
            .await
            .unwrap();

        let hits = store.search("vector database", 2, "c").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance <= hits[1].distance);
        assert_eq!(hits[0].metadata.get("source"), Some(&Value::from("doc3")));
    }

    #[tokio::test]
    async fn search_of_missing_collection_fails() {
        let store = MemoryVectorStore::default();
        store.create_collection("other").await.unwrap();
        let err = store.search("q", 3, "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn search_without_any_collection_is_empty() {
        let store = MemoryVectorStore::default();
        assert!(store.search("q", 3, "missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = MemoryVectorStore::default();
        store.create_collection("b").await.unwrap();
        store.create_collection("a").await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["a", "b"]);

        assert!(store.delete_collection("a").await.unwrap());
        assert!(!store.delete_collection("a").await.unwrap());
        assert_eq!(store.list_collections().await.unwrap(), vec!["b"]);
    }
}
