use serde::{Deserialize, Serialize};

/// A matchable substring of the affiliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentNode {
    pub text: String,
    pub span: (usize, usize), // [start, end] char positions in the affiliation
}

impl SegmentNode {
    pub fn new(text: String, span: (usize, usize)) -> Self {
        Self { text, span }
    }

    pub fn start(&self) -> usize {
        self.span.0
    }

    pub fn end(&self) -> usize {
        self.span.1
    }

    /// True when either endpoint of one span falls inside the other.
    pub fn overlaps(&self, other: &SegmentNode) -> bool {
        spans_overlap(self.span, other.span)
    }
}

/// Closed-interval overlap test shared by nodes and candidate matches.
pub fn spans_overlap(a: (usize, usize), b: (usize, usize)) -> bool {
    let within = |point: usize, (start, end): (usize, usize)| start <= point && point <= end;
    within(b.0, a) || within(b.1, a) || within(a.0, b) || within(a.1, b)
}
