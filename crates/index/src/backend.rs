use async_trait::async_trait;
use serde_json::Value;

use crate::error::SearchError;
use crate::organization::SearchHit;
use crate::strategy::Strategy;

/// A query ready to be sent to the backend.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub strategy: Strategy,
    /// Text the query was built from (normalized or raw depending on strategy).
    pub text: String,
    /// Backend-native request body.
    pub body: Value,
}

/// Full-text search capability over the organization corpus.
///
/// Zero hits is `Ok(vec![])`; only an unreachable or misbehaving backend is
/// an error.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError>;

    /// Liveness check.
    async fn ping(&self) -> Result<(), SearchError>;
}
