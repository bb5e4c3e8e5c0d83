use index::{Organization, Strategy};
use std::sync::Arc;

/// Result of scoring one organization against one substring.
///
/// Never mutated after construction; the `with_*` methods return modified
/// copies.
#[derive(Debug, Clone)]
pub struct CandidateMatch {
    organization: Arc<Organization>,
    substring: String,
    name: String,
    raw_score: f64,
    start: usize,
    end: usize,
    strategy: Strategy,
    chosen: bool,
}

impl CandidateMatch {
    pub fn new(
        organization: Arc<Organization>,
        substring: String,
        name: String,
        raw_score: f64,
        span: (usize, usize),
        strategy: Strategy,
    ) -> Self {
        Self {
            organization,
            substring,
            name,
            raw_score,
            start: span.0,
            end: span.1,
            strategy,
            chosen: false,
        }
    }

    pub fn organization(&self) -> &Arc<Organization> {
        &self.organization
    }

    pub fn organization_id(&self) -> &str {
        &self.organization.id
    }

    /// Text the organization was compared against.
    pub fn substring(&self) -> &str {
        &self.substring
    }

    /// Best-aligned name variant of the organization.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alignment score on the 0-100 scale.
    pub fn raw_score(&self) -> f64 {
        self.raw_score
    }

    /// Reported score, 0-1 rounded to two decimals.
    pub fn score(&self) -> f64 {
        self.raw_score.round() / 100.0
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn is_chosen(&self) -> bool {
        self.chosen
    }

    pub fn with_chosen(&self, chosen: bool) -> Self {
        Self {
            chosen,
            ..self.clone()
        }
    }

    /// Copy with the span moved right by `offset` chars.
    pub fn shifted(&self, offset: usize) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
            ..self.clone()
        }
    }
}
