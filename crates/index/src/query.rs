use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::SearchError;
use crate::organization::STATUS_ACTIVE;
use crate::strategy::Strategy;

/// Field names of the organization index mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFields {
    /// Normalized name fields searched by phrase/common/fuzzy queries.
    pub names: Vec<String>,
    pub acronyms: String,
    pub nested_path: String,
    pub nested_name: String,
    pub status: String,
}

impl Default for QueryFields {
    fn default() -> Self {
        Self {
            names: vec!["names.value.norm".to_string()],
            acronyms: "acronyms".to_string(),
            nested_path: "affiliation_match.names".to_string(),
            nested_name: "affiliation_match.names.name".to_string(),
            status: "status".to_string(),
        }
    }
}

/// Builds Elasticsearch request bodies, one shape per [`Strategy`].
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    fields: QueryFields,
    max_candidates: usize,
}

const COMMON_CUTOFF_FREQUENCY: f64 = 0.001;

impl QueryBuilder {
    pub fn new(fields: QueryFields, max_candidates: usize) -> Self {
        Self {
            fields,
            max_candidates,
        }
    }

    /// Full `_search` body for `text` under `strategy`.
    pub fn build(&self, strategy: Strategy, text: &str, active_only: bool) -> Result<Value, SearchError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SearchError::InvalidQuery(format!("empty {} query", strategy)));
        }

        let query = match strategy {
            Strategy::Phrase => self.dis_max(|f| json!({ "match_phrase": { f: text } })),
            Strategy::CommonTerms | Strategy::Heuristics => self.dis_max(|f| {
                json!({ "common": { f: { "query": text, "cutoff_frequency": COMMON_CUTOFF_FREQUENCY } } })
            }),
            Strategy::Fuzzy => {
                self.dis_max(|f| json!({ "match": { f: { "query": text, "fuzziness": "AUTO" } } }))
            }
            Strategy::Acronym => json!({ "match": { &self.fields.acronyms: text } }),
            Strategy::Exact => {
                let quoted = format!("\"{}\"", text.replace('"', " "));
                json!({
                    "query_string": {
                        "query": quoted,
                        "fields": self.fields.names,
                        "fuzzy_max_expansions": 1
                    }
                })
            }
            Strategy::SingleSearch => json!({
                "nested": {
                    "path": self.fields.nested_path,
                    "score_mode": "max",
                    "query": { "match": { &self.fields.nested_name: text } }
                }
            }),
        };

        let mut bool_query = json!({ "must": [query] });
        if active_only {
            bool_query["filter"] = json!([{ "term": { &self.fields.status: STATUS_ACTIVE } }]);
        }

        Ok(json!({
            "size": self.max_candidates,
            "track_total_hits": true,
            "query": { "bool": bool_query }
        }))
    }

    fn dis_max<F>(&self, clause: F) -> Value
    where
        F: Fn(&str) -> Value,
    {
        let queries: Vec<Value> = self.fields.names.iter().map(|f| clause(f)).collect();
        json!({ "dis_max": { "queries": queries } })
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(QueryFields::default(), 200)
    }
}
