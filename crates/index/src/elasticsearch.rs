use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::{SearchBackend, SearchQuery};
use crate::error::SearchError;
use crate::organization::{Organization, SearchHit};
use crate::retry::RetryPolicy;

/// `SearchBackend` over the Elasticsearch `_search` REST endpoint.
pub struct ElasticsearchBackend {
    base_url: String,
    index: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

impl ElasticsearchBackend {
    pub fn new(base_url: String, index: String, timeout: Duration, retry: RetryPolicy) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            index,
            client,
            retry,
        })
    }

    async fn send(&self, body: &Value) -> Result<Value, SearchError> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

/// Turn a raw `_search` response into typed hits. Hits without a usable
/// document are skipped.
pub fn parse_hits(response: Value) -> Result<Vec<SearchHit>, SearchError> {
    let parsed: SearchResponse =
        serde_json::from_value(response).map_err(|e| SearchError::Malformed(e.to_string()))?;

    let mut hits = Vec::with_capacity(parsed.hits.hits.len());
    for raw in parsed.hits.hits {
        let Some(source) = raw.source else {
            warn!(id = ?raw.id, "Skipping hit without _source");
            continue;
        };
        match Organization::from_document(raw.id.as_deref(), source) {
            Some(organization) => hits.push(SearchHit {
                score: raw.score.unwrap_or(0.0),
                organization: Arc::new(organization),
            }),
            None => warn!(id = ?raw.id, "Skipping malformed organization document"),
        }
    }
    Ok(hits)
}

#[async_trait]
impl SearchBackend for ElasticsearchBackend {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .retry
            .retry(query.strategy.label(), || self.send(&query.body))
            .await?;
        let hits = parse_hits(response)?;

        debug!(
            strategy = %query.strategy,
            text = %query.text,
            hits = hits.len(),
            "Search completed"
        );
        Ok(hits)
    }

    async fn ping(&self) -> Result<(), SearchError> {
        let url = format!("{}/_cluster/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SearchError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}
