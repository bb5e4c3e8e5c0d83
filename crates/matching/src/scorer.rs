use geo::RegionSet;
use index::{Organization, Strategy};
use normalize::{collapse_whitespace, normalize, partial_ratio_alignment, token_sort_ratio};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::candidate::CandidateMatch;
use crate::profile::ComparisonMode;

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*\)").expect("invalid PARENTHETICAL"));

const INSTITUTION_KEYWORDS: [&str; 7] = [
    "university",
    "college",
    "school",
    "department",
    "institute",
    "center",
    "hospital",
];

const GENERIC_NAMES: [&str; 2] = ["university school", "university hospital"];

const MAX_EXTRA_NAME_CHARS: usize = 4;
const MIN_NAME_CHARS: usize = 5;

/// Raw scores awarded when the text is one of the organization's acronyms.
const ACRONYM_SCORE_IN_REGION: f64 = 100.0;
const ACRONYM_SCORE: f64 = 90.0;
const AMBIGUOUS_ACRONYM: &str = "USA";

/// Whether normalized text is compared by sliding alignment rather than
/// token-sorted whole-string comparison.
pub fn prefers_partial(normalized: &str) -> bool {
    if normalized.contains(['(', ')', '-']) {
        return true;
    }
    INSTITUTION_KEYWORDS
        .iter()
        .filter(|k| normalized.contains(*k))
        .count()
        > 1
}

fn strip_parenthetical(normalized_name: &str) -> String {
    collapse_whitespace(&PARENTHETICAL.replace_all(normalized_name, ""))
}

/// Similarity (0-100) and matched char span within `text`; both sides are
/// already normalized.
fn compare(text: &str, name: &str, mode: ComparisonMode) -> (f64, (usize, usize)) {
    let partial = mode == ComparisonMode::Partial || prefers_partial(text);
    if partial {
        let alignment = partial_ratio_alignment(text, name);
        (alignment.score, (alignment.src_start, alignment.src_end))
    } else {
        (token_sort_ratio(text, name), (0, text.chars().count()))
    }
}

/// Similarity of an affiliation substring and a candidate name on a 0-1 scale.
pub fn similarity(substring: &str, name: &str) -> f64 {
    let text = normalize(substring);
    let name = strip_parenthetical(&normalize(name));
    compare(&text, &name, ComparisonMode::Adaptive).0 / 100.0
}

/// Names that cannot be compared meaningfully with `substring`.
pub fn is_skipped(substring: &str, name: &str) -> bool {
    let name_lower = name.to_lowercase();
    let text_lower = substring.to_lowercase();
    let same = name_lower == text_lower;
    let name_len = name.chars().count();
    let text_len = substring.chars().count();

    GENERIC_NAMES.contains(&name_lower.as_str())
        || name_len > text_len + MAX_EXTRA_NAME_CHARS
        || (name_len < MIN_NAME_CHARS && !same)
        || (!name.contains(' ') && !same)
        || (!substring.contains(' ') && !same)
}

/// Acronym award for an exact acronym hit, if any.
fn acronym_score(substring: &str, organization: &Organization, regions: &RegionSet) -> Option<f64> {
    if substring == AMBIGUOUS_ACRONYM || !organization.acronyms().any(|a| a == substring) {
        return None;
    }
    let in_region = organization
        .region()
        .is_some_and(|region| regions.contains(&region));
    if !regions.is_empty() && in_region {
        Some(ACRONYM_SCORE_IN_REGION)
    } else {
        Some(ACRONYM_SCORE)
    }
}

/// Best match of `substring` against every name of `organization`.
///
/// Spans are char offsets into the normalized substring. An organization with
/// no comparable name yields a zero-score match.
pub fn score_candidate(
    substring: &str,
    organization: &Arc<Organization>,
    strategy: Strategy,
    regions: &RegionSet,
    mode: ComparisonMode,
) -> CandidateMatch {
    let text = normalize(substring);
    let mut best_name = String::new();
    let mut best_score = 0.0;
    let mut best_span = (0, 0);

    for name in organization.labels() {
        if is_skipped(substring, name) {
            continue;
        }
        let (score, span) = compare(&text, &strip_parenthetical(&normalize(name)), mode);
        if score > best_score {
            best_name = name.to_string();
            best_score = score;
            best_span = span;
        }
    }

    if let Some(score) = acronym_score(substring, organization, regions) {
        if score > best_score {
            best_name = substring.to_string();
            best_score = score;
            best_span = (0, substring.chars().count());
        }
    }

    CandidateMatch::new(
        Arc::clone(organization),
        substring.to_string(),
        best_name,
        best_score,
        best_span,
        strategy,
    )
}
