use geo::Gazetteer;
use normalize::normalize;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::strategy::Strategy;

static UNIVERSITY_OF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"University of (\w+)").expect("invalid UNIVERSITY_OF"));
static X_UNIVERSITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+) University").expect("invalid X_UNIVERSITY"));
static ACRONYM_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]{3,}").expect("invalid ACRONYM_RUN"));

/// One query to issue: which substring it covers, where that substring sits
/// (char offset into the text it was derived from) and the text sent to the
/// backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuery {
    pub strategy: Strategy,
    pub substring: String,
    pub offset: usize,
    pub query_text: String,
}

impl PlannedQuery {
    fn new(strategy: Strategy, substring: String, offset: usize) -> Option<Self> {
        let query_text = match strategy {
            Strategy::Acronym | Strategy::Exact | Strategy::SingleSearch => substring.trim().to_string(),
            _ => normalize(&substring),
        };
        if query_text.is_empty() {
            return None;
        }
        Some(Self {
            strategy,
            substring,
            offset,
            query_text,
        })
    }
}

fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// Queries for one node text, in strategy order.
pub fn plan_node(strategies: &[Strategy], text: &str, gazetteer: &Gazetteer) -> Vec<PlannedQuery> {
    strategies
        .iter()
        .flat_map(|strategy| match strategy {
            Strategy::Heuristics => plan_heuristics(text),
            Strategy::Acronym => plan_acronyms(text, gazetteer),
            other => PlannedQuery::new(*other, text.to_string(), 0).into_iter().collect(),
        })
        .collect()
}

/// The node text plus its university rewrites. A node without rewrites gets
/// no heuristic queries; a rewrite equal to the node text is queried once.
pub fn plan_heuristics(text: &str) -> Vec<PlannedQuery> {
    let rewrites = heuristic_substrings(text);
    if rewrites.is_empty() {
        return Vec::new();
    }
    std::iter::once((text.to_string(), 0))
        .chain(rewrites.into_iter().filter(|(substring, _)| substring != text))
        .filter_map(|(substring, offset)| PlannedQuery::new(Strategy::Heuristics, substring, offset))
        .collect()
}

/// Acronym queries for runs of three or more capitals that are not ISO3
/// country codes.
pub fn plan_acronyms(text: &str, gazetteer: &Gazetteer) -> Vec<PlannedQuery> {
    ACRONYM_RUN
        .find_iter(text)
        .filter(|m| !gazetteer.is_iso3(m.as_str()))
        .filter_map(|m| {
            PlannedQuery::new(Strategy::Acronym, m.as_str().to_string(), char_offset(text, m.start()))
        })
        .collect()
}

/// "University of X" / "X University" rewrites, both the matched form and its
/// swapped counterpart, deduplicated in discovery order.
pub fn heuristic_substrings(text: &str) -> Vec<(String, usize)> {
    let mut substrings: Vec<(String, usize)> = Vec::new();
    let mut push = |s: String, offset: usize| {
        if !substrings.iter().any(|(existing, _)| *existing == s) {
            substrings.push((s, offset));
        }
    };

    if let Some(caps) = UNIVERSITY_OF.captures(text) {
        let (whole, name) = (&caps[0], &caps[1]);
        let offset = caps.get(0).map_or(0, |m| char_offset(text, m.start()));
        push(whole.to_string(), offset);
        push(format!("{} University", name), offset);
    }
    if let Some(caps) = X_UNIVERSITY.captures(text) {
        let (whole, name) = (&caps[0], &caps[1]);
        let offset = caps.get(0).map_or(0, |m| char_offset(text, m.start()));
        push(whole.to_string(), offset);
        push(format!("University of {}", name), offset);
    }
    substrings
}
