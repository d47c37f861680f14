//! Search collaborator interface and backends
//!
//! A check issues a [`SearchRequest`] to any [`SearchBackend`]. Two backends
//! ship with the crate: [`ElasticClient`] speaks the Elasticsearch `_search`
//! API over HTTP, [`MemoryIndex`] keeps documents in process and executes
//! filter trees itself.

pub mod elastic;
pub mod matcher;
pub mod memory;

pub use elastic::ElasticClient;
pub use memory::MemoryIndex;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::query::FilterNode;

/// One search issued by a check cycle
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: FilterNode,
    /// Index name or pattern (`logs-*`, `a,b`)
    pub index: String,
    pub sort_by: String,
    pub sort_ascending: bool,
    pub size: usize,
    pub timeout: Duration,
}

/// A matching document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub id: String,
    pub index: String,
    pub source: serde_json::Value,
}

impl Hit {
    /// Look up a field in the source; dots descend into nested objects
    pub fn field(&self, path: &str) -> Option<&serde_json::Value> {
        matcher::lookup(&self.source, path)
    }
}

/// Search outcome: at most `size` hits plus the total match count
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResult {
    pub hits: Vec<Hit>,
    pub total: u64,
    pub took_ms: u64,
}

impl SearchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn first(&self) -> Option<&Hit> {
        self.hits.first()
    }
}

/// Executes filter trees and query strings against a document store
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError>;
}

/// Search errors
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote error: {0}")]
    RemoteError(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),
}
