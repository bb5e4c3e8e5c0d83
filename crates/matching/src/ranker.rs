use std::collections::HashSet;

use crate::candidate::CandidateMatch;

/// Highest-scoring chosen match; the earliest wins a tie.
pub fn pick_chosen(chosen: &[CandidateMatch]) -> Option<&CandidateMatch> {
    chosen.iter().fold(None, |best: Option<&CandidateMatch>, c| match best {
        Some(b) if b.raw_score() >= c.raw_score() => Some(b),
        _ => Some(c),
    })
}

/// Merge per-node chosen matches and the scored pool into the final list.
///
/// The pool is filtered by status if requested, sorted by reported score
/// (stable, so discovery order breaks ties), deduplicated by organization and
/// truncated. The single best chosen match that passes the same status
/// filter is then moved to the front.
pub fn rank(
    chosen: &[CandidateMatch],
    all_scored: Vec<CandidateMatch>,
    active_only: bool,
    max_results: usize,
) -> Vec<CandidateMatch> {
    let mut items: Vec<CandidateMatch> = all_scored
        .into_iter()
        .filter(|c| !active_only || c.organization().is_active())
        .collect();
    items.sort_by(|a, b| b.score().total_cmp(&a.score()));

    let mut seen = HashSet::new();
    items.retain(|c| seen.insert(c.organization_id().to_string()));
    items.truncate(max_results);

    let eligible: Vec<CandidateMatch> = chosen
        .iter()
        .filter(|c| !active_only || c.organization().is_active())
        .cloned()
        .collect();
    if let Some(chosen) = pick_chosen(&eligible) {
        items.retain(|c| c.organization_id() != chosen.organization_id());
        items.insert(0, chosen.with_chosen(true));
        items.truncate(max_results);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::{Organization, Strategy};
    use serde_json::json;
    use std::sync::Arc;

    fn candidate(id: &str, status: &str, score: f64) -> CandidateMatch {
        let source = json!({"id": id, "status": status, "names": []});
        let organization = Arc::new(Organization::from_document(None, source).unwrap());
        CandidateMatch::new(organization, "text".into(), id.into(), score, (0, 4), Strategy::Fuzzy)
    }

    fn ids(items: &[CandidateMatch]) -> Vec<&str> {
        items.iter().map(|c| c.organization_id()).collect()
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        let pool = vec![
            candidate("a", "active", 70.0),
            candidate("b", "active", 90.0),
            candidate("a", "active", 95.0),
            candidate("c", "active", 90.2),
        ];
        let items = rank(&[], pool, true, 100);
        assert_eq!(ids(&items), vec!["a", "b", "c"]);
        assert_eq!(items[0].score(), 0.95);
        assert!(items.iter().all(|c| !c.is_chosen()));
    }

    #[test]
    fn test_chosen_is_first_and_unique() {
        let pool = vec![
            candidate("a", "active", 99.0),
            candidate("b", "active", 97.0),
            candidate("b", "active", 97.0),
        ];
        let chosen = vec![candidate("b", "active", 97.0), candidate("a", "active", 96.0)];
        let items = rank(&chosen, pool, true, 100);
        assert_eq!(ids(&items), vec!["b", "a"]);
        assert!(items[0].is_chosen());
        assert!(!items[1].is_chosen());
    }

    #[test]
    fn test_active_filter() {
        let pool = vec![candidate("a", "inactive", 99.0), candidate("b", "active", 80.0)];
        assert_eq!(ids(&rank(&[], pool.clone(), true, 100)), vec!["b"]);
        assert_eq!(ids(&rank(&[], pool, false, 100)), vec!["a", "b"]);
    }

    #[test]
    fn test_inactive_chosen_dropped_when_active_only() {
        let chosen = vec![candidate("a", "inactive", 100.0)];
        let pool = vec![candidate("a", "inactive", 100.0), candidate("b", "active", 80.0)];
        let items = rank(&chosen, pool.clone(), true, 100);
        assert_eq!(ids(&items), vec!["b"]);
        assert!(!items[0].is_chosen());

        let items = rank(&chosen, pool, false, 100);
        assert_eq!(ids(&items), vec!["a", "b"]);
        assert!(items[0].is_chosen());
    }

    #[test]
    fn test_truncation() {
        let pool: Vec<CandidateMatch> = (0..150)
            .map(|i| candidate(&format!("org-{}", i), "active", 60.0 + (i % 30) as f64))
            .collect();
        let chosen = vec![candidate("org-chosen", "active", 100.0)];
        let items = rank(&chosen, pool, true, 100);
        assert_eq!(items.len(), 100);
        assert_eq!(items[0].organization_id(), "org-chosen");
    }

    #[test]
    fn test_pick_chosen_prefers_earliest_on_tie() {
        let chosen = vec![
            candidate("a", "active", 97.0),
            candidate("b", "active", 100.0),
            candidate("c", "active", 100.0),
        ];
        assert_eq!(pick_chosen(&chosen).unwrap().organization_id(), "b");
        assert!(pick_chosen(&[]).is_none());
    }
}
