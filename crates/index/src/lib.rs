pub mod backend;
pub mod elasticsearch;
pub mod error;
pub mod organization;
pub mod planner;
pub mod query;
pub mod retry;
pub mod strategy;

pub use backend::{SearchBackend, SearchQuery};
pub use elasticsearch::ElasticsearchBackend;
pub use error::SearchError;
pub use organization::{NameVariant, Organization, SearchHit};
pub use planner::PlannedQuery;
pub use query::{QueryBuilder, QueryFields};
pub use retry::RetryPolicy;
pub use strategy::Strategy;

use geo::Gazetteer;
use std::sync::Arc;

/// Candidate retrieval: turns substrings into planned queries and runs them
/// against a [`SearchBackend`].
#[derive(Clone)]
pub struct CandidateSearch {
    backend: Arc<dyn SearchBackend>,
    gazetteer: Arc<Gazetteer>,
    builder: QueryBuilder,
}

impl CandidateSearch {
    pub fn new(backend: Arc<dyn SearchBackend>, gazetteer: Arc<Gazetteer>, builder: QueryBuilder) -> Self {
        Self {
            backend,
            gazetteer,
            builder,
        }
    }

    /// Queries for `text` under each strategy, in the given strategy order.
    pub fn plan(&self, strategies: &[Strategy], text: &str) -> Vec<PlannedQuery> {
        planner::plan_node(strategies, text, &self.gazetteer)
    }

    pub fn plan_acronyms(&self, affiliation: &str) -> Vec<PlannedQuery> {
        planner::plan_acronyms(affiliation, &self.gazetteer)
    }

    pub async fn search(&self, planned: &PlannedQuery, active_only: bool) -> Result<Vec<SearchHit>, SearchError> {
        let body = self.builder.build(planned.strategy, &planned.query_text, active_only)?;
        let query = SearchQuery {
            strategy: planned.strategy,
            text: planned.query_text.clone(),
            body,
        };
        self.backend.search(&query).await
    }

    pub async fn ping(&self) -> Result<(), SearchError> {
        self.backend.ping().await
    }
}
