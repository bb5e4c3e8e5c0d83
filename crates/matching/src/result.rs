use serde::{Deserialize, Serialize};

use crate::candidate::CandidateMatch;

/// Ranked output of one match request. A chosen item, if any, is first.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub items: Vec<CandidateMatch>,
    pub trace: MatchTrace,
}

/// Counters describing how a result was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchTrace {
    pub nodes: usize,
    pub queries_issued: usize,
    pub queries_failed: usize,
    pub queries_timed_out: usize,
    pub candidates_scored: usize,
    pub exact_match: bool,
}

impl MatchResult {
    pub fn chosen(&self) -> Option<&CandidateMatch> {
        self.items.first().filter(|item| item.is_chosen())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
