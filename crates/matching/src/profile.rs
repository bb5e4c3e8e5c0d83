use index::Strategy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationMode {
    /// Whole affiliation plus each separator-delimited part.
    Graph,
    /// One node for the whole affiliation.
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonMode {
    /// Partial alignment for keyword-heavy or punctuated text, token-sort otherwise.
    Adaptive,
    /// Always partial alignment.
    Partial,
}

/// Tuning knobs for one matching deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingProfile {
    pub name: String,
    pub segmentation: SegmentationMode,
    /// Strategies run for every node, in this order.
    pub node_strategies: Vec<Strategy>,
    /// Search acronym runs of the whole affiliation once per request.
    pub acronym_pass: bool,
    /// Short-circuit on a perfect quoted-phrase match of the whole affiliation.
    pub exact_precheck: bool,
    pub comparison: ComparisonMode,
    /// Candidates below this score (0-1) are discarded.
    pub min_score: f64,
    /// A candidate must reach this score (0-1) to be chosen.
    pub min_chosen_score: f64,
    pub max_candidates: usize,
    pub max_results: usize,
    pub max_concurrent_queries: usize,
    pub query_timeout_ms: u64,
    pub min_city_population: u64,
}

impl Default for MatchingProfile {
    fn default() -> Self {
        Self::multi_search()
    }
}

impl MatchingProfile {
    /// Graph segmentation with phrase, common-terms, fuzzy and heuristic
    /// queries per node.
    pub fn multi_search() -> Self {
        Self {
            name: "multi".to_string(),
            segmentation: SegmentationMode::Graph,
            node_strategies: vec![
                Strategy::Phrase,
                Strategy::CommonTerms,
                Strategy::Fuzzy,
                Strategy::Heuristics,
            ],
            acronym_pass: true,
            exact_precheck: false,
            comparison: ComparisonMode::Adaptive,
            min_score: 0.50,
            min_chosen_score: 0.92,
            max_candidates: 200,
            max_results: 100,
            max_concurrent_queries: 8,
            query_timeout_ms: 5_000,
            min_city_population: 15_000,
        }
    }

    /// One free-text query over the whole affiliation.
    pub fn single_search() -> Self {
        Self {
            name: "single".to_string(),
            segmentation: SegmentationMode::Flat,
            node_strategies: vec![Strategy::SingleSearch],
            acronym_pass: false,
            exact_precheck: false,
            comparison: ComparisonMode::Partial,
            min_score: 0.50,
            min_chosen_score: 0.96,
            ..Self::multi_search()
        }
    }

    /// Preset by name ("multi" or "single").
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "multi" | "multi_search" => Some(Self::multi_search()),
            "single" | "single_search" => Some(Self::single_search()),
            _ => None,
        }
    }

    pub(crate) fn raw_floor(&self) -> f64 {
        self.min_score * 100.0
    }

    pub(crate) fn raw_chosen(&self) -> f64 {
        self.min_chosen_score * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let multi = MatchingProfile::default();
        assert_eq!(multi.segmentation, SegmentationMode::Graph);
        assert_eq!(multi.node_strategies.len(), 4);
        assert!(multi.acronym_pass);
        assert_eq!(multi.min_chosen_score, 0.92);

        let single = MatchingProfile::single_search();
        assert_eq!(single.segmentation, SegmentationMode::Flat);
        assert_eq!(single.node_strategies, vec![Strategy::SingleSearch]);
        assert_eq!(single.comparison, ComparisonMode::Partial);
        assert_eq!(single.min_chosen_score, 0.96);
        assert_eq!(single.max_candidates, 200);
    }

    #[test]
    fn test_by_name() {
        assert_eq!(MatchingProfile::by_name("Single").unwrap().name, "single");
        assert_eq!(MatchingProfile::by_name("multi").unwrap().name, "multi");
        assert!(MatchingProfile::by_name("graph").is_none());
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_value(MatchingProfile::multi_search()).unwrap();
        assert_eq!(json["segmentation"], "graph");
        assert_eq!(json["node_strategies"][1], "COMMON TERMS");
        let back: MatchingProfile = serde_json::from_value(json).unwrap();
        assert_eq!(back.comparison, ComparisonMode::Adaptive);
    }
}
