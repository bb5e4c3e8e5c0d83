use deunicode::deunicode;
use normalize::{collapse_whitespace, partial_ratio, ratio};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::gazetteer::{Gazetteer, TermKind};

/// Region codes inferred for one request. Empty means unconstrained.
pub type RegionSet = BTreeSet<String>;

const COUNTRY_MATCH_THRESHOLD: f64 = 90.0;

static NON_LOWER_ALPHA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z]").expect("invalid NON_LOWER_ALPHA"));
static NON_ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z]").expect("invalid NON_ALPHA"));

/// Map an alpha-2 code to its region bucket. Jurisdictions that are often
/// confused in registry data share a bucket; everything else maps to itself.
pub fn to_region(code: &str) -> String {
    let code = code.trim().to_uppercase();
    match code.as_str() {
        "GB" | "UK" => "GB-UK".to_string(),
        "CN" | "HK" | "TW" => "CN-HK-TW".to_string(),
        "PR" | "US" => "US-PR".to_string(),
        _ => code,
    }
}

pub(crate) fn detect_codes(gazetteer: &Gazetteer, text: &str) -> BTreeSet<String> {
    let ascii = deunicode(text);
    let ascii = ascii.trim();
    let lower = collapse_whitespace(&ascii.to_lowercase());
    let lower_alpha = collapse_whitespace(&NON_LOWER_ALPHA.replace_all(&ascii.to_lowercase(), " "));
    let alpha = collapse_whitespace(&NON_ALPHA.replace_all(ascii, " "));

    let lower_tokens: Vec<&str> = lower_alpha.split(' ').filter(|t| !t.is_empty()).collect();
    let alpha_tokens: Vec<&str> = alpha.split(' ').filter(|t| !t.is_empty()).collect();

    let best_token = |term: &str, tokens: &[&str]| -> f64 {
        tokens.iter().map(|t| ratio(term, t)).fold(0.0, f64::max)
    };

    let mut codes = BTreeSet::new();
    for term in gazetteer.terms() {
        let score = match term.kind {
            TermKind::Code => best_token(&term.term, &alpha_tokens),
            TermKind::Name if term.term.chars().any(|c| !c.is_ascii_lowercase()) => {
                partial_ratio(&term.term, &lower)
            }
            TermKind::Name => best_token(&term.term, &lower_tokens),
        };
        if score >= COUNTRY_MATCH_THRESHOLD {
            codes.insert(term.code.clone());
        }
    }
    codes
}
