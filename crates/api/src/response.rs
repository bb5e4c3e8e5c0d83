use index::Strategy;
use matching::{CandidateMatch, MatchResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `GET /organizations?affiliation=...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingResponse {
    pub number_of_results: usize,
    pub items: Vec<MatchedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedItem {
    pub substring: String,
    pub score: f64,
    pub matching_type: Strategy,
    pub chosen: bool,
    pub organization: Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
        }
    }
}

impl From<&CandidateMatch> for MatchedItem {
    fn from(candidate: &CandidateMatch) -> Self {
        Self {
            substring: candidate.substring().to_string(),
            score: candidate.score(),
            matching_type: candidate.strategy(),
            chosen: candidate.is_chosen(),
            organization: candidate.organization().source.clone(),
        }
    }
}

impl From<&MatchResult> for MatchingResponse {
    fn from(result: &MatchResult) -> Self {
        let items: Vec<MatchedItem> = result.items.iter().map(MatchedItem::from).collect();
        Self {
            number_of_results: items.len(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::Organization;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_response_shape() {
        let source = json!({
            "id": "https://ror.org/00excel00",
            "status": "active",
            "names": [{"value": "University of Excellence", "types": ["ror_display"]}]
        });
        let organization = Arc::new(Organization::from_document(None, source.clone()).unwrap());
        let chosen = CandidateMatch::new(
            organization,
            "University of Excellence".into(),
            "University of Excellence".into(),
            100.0,
            (0, 24),
            Strategy::CommonTerms,
        )
        .with_chosen(true);
        let result = MatchResult {
            items: vec![chosen],
            ..MatchResult::default()
        };

        let body = serde_json::to_value(MatchingResponse::from(&result)).unwrap();
        assert_eq!(body["number_of_results"], 1);
        let item = &body["items"][0];
        assert_eq!(item["substring"], "University of Excellence");
        assert_eq!(item["score"], 1.0);
        assert_eq!(item["matching_type"], "COMMON TERMS");
        assert_eq!(item["chosen"], true);
        assert_eq!(item["organization"], source);
    }

    #[test]
    fn test_error_body() {
        let body = serde_json::to_value(ErrorResponse::new("'affiliation' parameter missing")).unwrap();
        assert_eq!(body, json!({"errors": ["'affiliation' parameter missing"]}));
    }
}
