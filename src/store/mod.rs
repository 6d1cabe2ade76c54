//! Vector store capability consumed by the dispatcher.
//!
//! The dispatcher only sees the [`VectorStore`] trait. [`MemoryVectorStore`]
//! is the in-process implementation used by the `vsmq` binary and tests.

pub mod embedding;
pub mod memory;

pub use memory::MemoryVectorStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub document: String,
    pub metadata: Map<String, Value>,
    /// Cosine distance to the query; smaller is closer.
    pub distance: Option<f32>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates `name`; succeeds without changes if it already exists.
    async fn create_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Whether `name` has been created and not deleted.
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Adds one document per `(key, text)` entry, recording the key as
    /// `metadata.source` and creating the collection if needed. Returns the
    /// number of documents added.
    async fn add_dictionary(&self, name: &str, documents: &[(String, String)]) -> Result<usize, StoreError>;

    /// Up to `n_results` hits from `name`, closest first.
    async fn search(&self, query: &str, n_results: usize, name: &str) -> Result<Vec<SearchHit>, StoreError>;

    /// Returns `false` if there was no such collection.
    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError>;

    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;
}
