//! Indel-based string similarity on a 0-100 scale.
//!
//! `partial_ratio_alignment` slides the shorter string over the longer one and
//! reports where in the first argument the best window sits, in char offsets.

use rapidfuzz::fuzz;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub score: f64,
    /// Char offsets into the first argument.
    pub src_start: usize,
    pub src_end: usize,
    /// Char offsets into the second argument.
    pub dest_start: usize,
    pub dest_end: usize,
}

impl Alignment {
    fn empty() -> Self {
        Self {
            score: 0.0,
            src_start: 0,
            src_end: 0,
            dest_start: 0,
            dest_end: 0,
        }
    }
}

fn chars_ratio(a: &[char], b: &[char]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    fuzz::ratio(a.iter().copied(), b.iter().copied()) * 100.0
}

/// Normalized indel similarity.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    chars_ratio(&a, &b)
}

/// `ratio` after sorting the whitespace-separated tokens of both sides.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Best `ratio` of the shorter string against any window of the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    partial_ratio_alignment(a, b).score
}

pub fn partial_ratio_alignment(a: &str, b: &str) -> Alignment {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() || b.is_empty() {
        let mut alignment = Alignment::empty();
        if a.is_empty() && b.is_empty() {
            alignment.score = 100.0;
        }
        return alignment;
    }

    if a.len() <= b.len() {
        let (score, start, end) = best_window(&a, &b);
        let forward = Alignment {
            score,
            src_start: 0,
            src_end: a.len(),
            dest_start: start,
            dest_end: end,
        };
        if a.len() < b.len() || score >= 100.0 {
            return forward;
        }
        // Equal lengths: either side may serve as the needle.
        let (score, start, end) = best_window(&b, &a);
        if score > forward.score {
            return Alignment {
                score,
                src_start: start,
                src_end: end,
                dest_start: 0,
                dest_end: b.len(),
            };
        }
        forward
    } else {
        let (score, start, end) = best_window(&b, &a);
        Alignment {
            score,
            src_start: start,
            src_end: end,
            dest_start: 0,
            dest_end: b.len(),
        }
    }
}

/// Scan windows of `haystack` against `needle`: growing prefixes, full-length
/// windows, then shrinking suffixes. The first window with the top score wins.
fn best_window(needle: &[char], haystack: &[char]) -> (f64, usize, usize) {
    let n = needle.len();
    let m = haystack.len();

    let prefixes = (1..n).map(|end| (0, end));
    let full = (0..=m - n).map(|start| (start, start + n));
    let suffixes = (m - n + 1..m).map(|start| (start, m));

    let mut best = (0.0, 0, n.min(m));
    for (start, end) in prefixes.chain(full).chain(suffixes) {
        let score = chars_ratio(needle, &haystack[start..end]);
        if score > best.0 {
            best = (score, start, end);
            if score >= 100.0 {
                break;
            }
        }
    }
    best
}
