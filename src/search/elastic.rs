use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Hit, SearchBackend, SearchError, SearchRequest, SearchResult};
use crate::query::to_query_dsl;

/// Client for an Elasticsearch-compatible `_search` endpoint
#[derive(Debug, Clone)]
pub struct ElasticClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ElasticClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SearchError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| SearchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the `_search` request body
    pub fn search_body(request: &SearchRequest) -> serde_json::Value {
        let order = if request.sort_ascending { "asc" } else { "desc" };
        json!({
            "query": to_query_dsl(&request.query),
            "sort": [{ request.sort_by.as_str(): { "order": order } }],
            "size": request.size,
            "timeout": format!("{}ms", request.timeout.as_millis()),
        })
    }

    /// Check the cluster answers on its root endpoint
    pub async fn health_check(&self) -> Result<bool, SearchError> {
        let response = self
            .http_client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl SearchBackend for ElasticClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        let url = format!("{}/{}/_search", self.base_url, request.index);

        let response = self
            .http_client
            .post(&url)
            .timeout(request.timeout)
            .json(&Self::search_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout(request.timeout)
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SearchError::IndexNotFound(request.index.clone()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SearchError::RemoteError(format!("{}: {}", status, error_text)));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Deserialization(e.to_string()))?;

        if body.timed_out {
            return Err(SearchError::Timeout(request.timeout));
        }

        Ok(body.into())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    timed_out: bool,
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    total: TotalHits,
    #[serde(default)]
    hits: Vec<RawHit>,
}

/// `hits.total` is a bare number before ES 7 and `{value, relation}` after
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(rename = "_index", default)]
    index: String,
    #[serde(rename = "_source", default)]
    source: serde_json::Value,
}

impl From<SearchResponse> for SearchResult {
    fn from(body: SearchResponse) -> Self {
        let total = match body.hits.total {
            TotalHits::Count(n) => n,
            TotalHits::Object { value } => value,
        };
        SearchResult {
            hits: body
                .hits
                .hits
                .into_iter()
                .map(|h| Hit {
                    id: h.id,
                    index: h.index,
                    source: h.source,
                })
                .collect(),
            total,
            took_ms: body.took,
        }
    }
}
