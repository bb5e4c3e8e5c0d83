//! Picking one candidate out of a node's scored pool.
//!
//! Candidates first collect pairwise preference points; ties among the
//! best-rated are broken by position, keeping the last candidate whose span
//! no other organization's span overlaps.

use segment::spans_overlap;

use crate::candidate::CandidateMatch;

const UNIVERSITY_MARKER: &str = "univ";
const LENGTH_MARGIN: usize = 4;
const NEAR_PERFECT: f64 = 99.0;

/// Whether `candidate` is preferred over `other` for a text of `text_len`
/// chars.
pub fn is_better(text_len: usize, candidate: &CandidateMatch, other: &CandidateMatch) -> bool {
    let mut points: i32 = 0;

    let c_univ = candidate.name().to_lowercase().contains(UNIVERSITY_MARKER);
    let o_univ = other.name().to_lowercase().contains(UNIVERSITY_MARKER);
    if c_univ && !o_univ {
        points += 1;
    }
    if !c_univ && o_univ {
        points -= 1;
    }

    let c_diff = candidate.name().chars().count().abs_diff(text_len);
    let o_diff = other.name().chars().count().abs_diff(text_len);
    if o_diff > c_diff + LENGTH_MARGIN {
        points += 1;
    }
    if c_diff > o_diff + LENGTH_MARGIN {
        points -= 1;
    }

    if candidate.start() > other.end() {
        points += 1;
    }
    if other.start() > candidate.end() {
        points -= 1;
    }

    if candidate.raw_score() > NEAR_PERFECT && other.raw_score() < NEAR_PERFECT {
        points += 1;
    }
    if candidate.raw_score() < NEAR_PERFECT && other.raw_score() > NEAR_PERFECT {
        points -= 1;
    }

    points > 0
}

/// Preference points of every candidate against the rest of the pool.
pub fn rescore(text_len: usize, candidates: &[CandidateMatch]) -> Vec<usize> {
    candidates
        .iter()
        .map(|candidate| {
            candidates
                .iter()
                .filter(|other| is_better(text_len, candidate, other))
                .count()
        })
        .collect()
}

/// Last candidate, in pool order, that no other organization in the set
/// overlaps.
pub fn last_non_overlapping<'a>(candidates: &[&'a CandidateMatch]) -> Option<&'a CandidateMatch> {
    candidates
        .iter()
        .filter(|candidate| {
            !candidates.iter().any(|other| {
                other.organization_id() != candidate.organization_id()
                    && spans_overlap(candidate.span(), other.span())
            })
        })
        .last()
        .copied()
}

/// The pool's best candidate, provided it reaches `min_chosen` (raw scale).
pub fn choose(text_len: usize, pool: &[CandidateMatch], min_chosen: f64) -> Option<CandidateMatch> {
    match pool {
        [] => None,
        [only] => (only.raw_score() >= min_chosen).then(|| only.clone()),
        _ => {
            let points = rescore(text_len, pool);
            let eligible: Vec<(&CandidateMatch, usize)> = pool
                .iter()
                .zip(points)
                .filter(|(c, _)| c.raw_score() >= min_chosen)
                .collect();
            let top = eligible.iter().map(|(_, p)| *p).max()?;
            let top_scored: Vec<&CandidateMatch> = eligible
                .iter()
                .filter(|(_, p)| *p == top)
                .map(|(c, _)| *c)
                .collect();

            match top_scored.as_slice() {
                [single] => Some((*single).clone()),
                _ => last_non_overlapping(&top_scored).cloned(),
            }
        }
    }
}
