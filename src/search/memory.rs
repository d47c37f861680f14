use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use super::matcher::{lookup, matches};
use super::{Hit, SearchBackend, SearchError, SearchRequest, SearchResult};

/// In-process document index
pub struct MemoryIndex {
    /// Documents indexed by index name, in insertion order
    indices: DashMap<String, Vec<Hit>>,
    next_id: AtomicU64,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            indices: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a document (creates the index if needed); returns its id
    pub fn insert(&self, index: &str, source: Json) -> String {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed).to_string();
        self.indices.entry(index.to_string()).or_default().push(Hit {
            id: id.clone(),
            index: index.to_string(),
            source,
        });
        id
    }

    /// Insert multiple documents
    pub fn insert_batch(&self, index: &str, docs: impl IntoIterator<Item = Json>) -> usize {
        docs.into_iter().map(|doc| self.insert(index, doc)).count()
    }

    /// Drop every document of an index
    pub fn clear(&self, index: &str) -> bool {
        self.indices.remove(index).is_some()
    }

    /// List index names
    pub fn list_indices(&self) -> Vec<String> {
        self.indices.iter().map(|e| e.key().clone()).collect()
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.indices.get(index).map(|docs| docs.len()).unwrap_or(0)
    }

    /// Resolve an index pattern (`logs-*`, `a,b`) to existing index names
    fn resolve(&self, pattern: &str) -> Result<Vec<String>, SearchError> {
        let mut names = Vec::new();

        for part in pattern.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part.contains('*') {
                let re = glob_regex(part);
                names.extend(
                    self.indices
                        .iter()
                        .map(|e| e.key().clone())
                        .filter(|name| re.as_ref().map(|re| re.is_match(name)).unwrap_or(false)),
                );
            } else if self.indices.contains_key(part) {
                names.push(part.to_string());
            } else {
                return Err(SearchError::IndexNotFound(part.to_string()));
            }
        }

        names.sort();
        names.dedup();
        Ok(names)
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for MemoryIndex {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        let start = std::time::Instant::now();

        let mut hits: Vec<Hit> = Vec::new();
        for name in self.resolve(&request.index)? {
            if let Some(docs) = self.indices.get(&name) {
                hits.extend(
                    docs.iter()
                        .filter(|hit| matches(&request.query, &hit.source))
                        .cloned(),
                );
            }
        }

        let total = hits.len() as u64;

        hits.sort_by(|a, b| {
            let ordering = sort_key_cmp(
                lookup(&a.source, &request.sort_by),
                lookup(&b.source, &request.sort_by),
            );
            if request.sort_ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
        hits.truncate(request.size);

        Ok(SearchResult {
            hits,
            total,
            took_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn glob_regex(pattern: &str) -> Option<regex::Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    regex::Regex::new(&format!("^{}$", escaped)).ok()
}

/// Numbers compare numerically, strings lexically; missing values sort first
fn sort_key_cmp(a: Option<&Json>, b: Option<&Json>) -> Ordering {
    match (a, b) {
        (Some(Json::Number(x)), Some(Json::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Json::String(x)), Some(Json::String(y))) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterNode, RangeOp};
    use serde_json::json;
    use std::time::Duration;

    fn request(query: FilterNode, index: &str) -> SearchRequest {
        SearchRequest {
            query,
            index: index.to_string(),
            sort_by: "ts".to_string(),
            sort_ascending: false,
            size: 10,
            timeout: Duration::from_secs(1),
        }
    }

    fn seeded() -> MemoryIndex {
        let index = MemoryIndex::new();
        index.insert_batch(
            "logs-2024.01.01",
            vec![
                json!({"ts": 1, "status": 200, "host": "a"}),
                json!({"ts": 2, "status": 503, "host": "b"}),
            ],
        );
        index.insert_batch(
            "logs-2024.01.02",
            vec![
                json!({"ts": 3, "status": 500, "host": "a"}),
                json!({"ts": 4, "status": 404, "host": "c"}),
            ],
        );
        index.insert("metrics", json!({"ts": 5, "status": 500}));
        index
    }

    #[tokio::test]
    async fn test_search_pattern_and_sort() {
        let index = seeded();
        let query = FilterNode::range("status").bound(RangeOp::Gte, 500);

        let result = index.search(&request(query, "logs-*")).await.unwrap();
        assert_eq!(result.total, 2);
        let ts: Vec<_> = result.hits.iter().map(|h| h.source["ts"].clone()).collect();
        assert_eq!(ts, vec![json!(3), json!(2)]);
    }

    #[tokio::test]
    async fn test_search_size_and_ascending() {
        let index = seeded();
        let query = FilterNode::query_string("*", false);
        let mut req = request(query, "logs-*,metrics");
        req.size = 2;
        req.sort_ascending = true;

        let result = index.search(&req).await.unwrap();
        assert_eq!(result.total, 5);
        assert_eq!(result.hits.len(), 2);
        assert_eq!(result.hits[0].source["ts"], json!(1));
    }

    #[tokio::test]
    async fn test_search_missing_index() {
        let index = seeded();
        let err = index
            .search(&request(FilterNode::term("status", 500), "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::IndexNotFound(_)));

        let result = index
            .search(&request(FilterNode::term("status", 500), "nope-*"))
            .await
            .unwrap();
        assert_eq!(result.total, 0);
    }

    #[test]
    fn test_clear_and_counts() {
        let index = seeded();
        assert_eq!(index.doc_count("logs-2024.01.01"), 2);
        assert_eq!(index.list_indices().len(), 3);
        assert!(index.clear("metrics"));
        assert!(!index.clear("metrics"));
        assert_eq!(index.doc_count("metrics"), 0);
    }
}
