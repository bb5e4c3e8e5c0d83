use geo::Gazetteer;
use normalize::collapse_whitespace;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::node::SegmentNode;

static SPECIAL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[+\-=|><!(){}\[\]^"~*?:/.,;]"#).expect("invalid SPECIAL_CHARS")
});
static POSTAL_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{5}\b").expect("invalid POSTAL_CODE"));

const PART_SEPARATORS: [char; 3] = [',', ';', ':'];

pub struct SegmenterConfig {
    /// Cities above this population are treated as bare geography.
    pub min_city_population: u64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_city_population: 15_000,
        }
    }
}

pub struct Segmenter {
    gazetteer: Arc<Gazetteer>,
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(gazetteer: Arc<Gazetteer>, config: SegmenterConfig) -> Self {
        Self { gazetteer, config }
    }

    /// Whole cleaned affiliation first, then each separator-delimited part.
    /// Empty, duplicate and bare-geography texts are dropped.
    pub fn segment(&self, affiliation: &str) -> Vec<SegmentNode> {
        let affiliation = decode_entities(affiliation);
        let mut nodes: Vec<SegmentNode> = Vec::new();

        let whole_span = (0, affiliation.chars().count());
        self.push_node(&mut nodes, clean(&affiliation), whole_span);

        let mut start = 0;
        for part in affiliation.split(PART_SEPARATORS) {
            let len = part.chars().count();
            self.push_node(&mut nodes, clean(part), (start, start + len));
            start += len + 1;
        }

        debug!(nodes = nodes.len(), "Affiliation segmented");
        nodes
    }

    /// Single node spanning the raw affiliation, for flat matching. Still
    /// empty when the cleaned text is bare geography.
    pub fn whole(&self, affiliation: &str) -> Vec<SegmentNode> {
        let affiliation = decode_entities(affiliation);
        let cleaned = clean(&affiliation);
        if cleaned.is_empty() || self.is_do_not_match(&cleaned) {
            return Vec::new();
        }
        let text = collapse_whitespace(&affiliation);
        let span = (0, affiliation.chars().count());
        vec![SegmentNode::new(text, span)]
    }

    pub fn is_do_not_match(&self, text: &str) -> bool {
        self.gazetteer
            .is_do_not_match(text, self.config.min_city_population)
    }

    fn push_node(&self, nodes: &mut Vec<SegmentNode>, text: String, span: (usize, usize)) {
        if text.is_empty() || self.is_do_not_match(&text) {
            return;
        }
        if nodes.iter().any(|n| n.text == text) {
            return;
        }
        nodes.push(SegmentNode::new(text, span));
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
}

/// Strip search-syntax punctuation and postal codes, collapse whitespace.
pub fn clean(text: &str) -> String {
    let stripped = SPECIAL_CHARS.replace_all(text, " ");
    let stripped = POSTAL_CODE.replace_all(&stripped, "");
    collapse_whitespace(&stripped)
}
