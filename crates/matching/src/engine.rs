use futures::stream::{self, StreamExt};
use geo::{Gazetteer, RegionSet};
use index::{
    CandidateSearch, PlannedQuery, QueryBuilder, QueryFields, SearchBackend, SearchError, SearchHit, Strategy,
};
use segment::{SegmentNode, Segmenter, SegmenterConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::candidate::CandidateMatch;
use crate::error::MatchError;
use crate::profile::{MatchingProfile, SegmentationMode};
use crate::ranker;
use crate::result::{MatchResult, MatchTrace};
use crate::scorer;
use crate::selection;

/// A planned query tied to the node it was derived from. `node` is `None` for
/// the whole-affiliation acronym pass.
struct Task {
    node: Option<usize>,
    base: usize,
    planned: PlannedQuery,
}

enum Outcome {
    Hits(Vec<SearchHit>),
    Failed(SearchError),
    TimedOut,
}

/// Resolves affiliation strings to organizations.
pub struct Matcher {
    search: CandidateSearch,
    segmenter: Segmenter,
    gazetteer: Arc<Gazetteer>,
    profile: MatchingProfile,
}

impl Matcher {
    pub fn new(backend: Arc<dyn SearchBackend>, gazetteer: Arc<Gazetteer>, profile: MatchingProfile) -> Self {
        Self::with_fields(backend, gazetteer, profile, QueryFields::default())
    }

    pub fn with_fields(
        backend: Arc<dyn SearchBackend>,
        gazetteer: Arc<Gazetteer>,
        profile: MatchingProfile,
        fields: QueryFields,
    ) -> Self {
        let builder = QueryBuilder::new(fields, profile.max_candidates);
        let search = CandidateSearch::new(backend, Arc::clone(&gazetteer), builder);
        let segmenter = Segmenter::new(
            Arc::clone(&gazetteer),
            SegmenterConfig {
                min_city_population: profile.min_city_population,
            },
        );
        Self {
            search,
            segmenter,
            gazetteer,
            profile,
        }
    }

    pub fn profile(&self) -> &MatchingProfile {
        &self.profile
    }

    /// Ping the search backend.
    pub async fn health(&self) -> Result<(), SearchError> {
        self.search.ping().await
    }

    pub async fn match_affiliation(&self, affiliation: &str, active_only: bool) -> Result<MatchResult, MatchError> {
        if affiliation.trim().is_empty() {
            return Err(MatchError::MissingAffiliation);
        }

        let regions = self.gazetteer.extract_regions(affiliation);
        let mut trace = MatchTrace::default();
        let mut first_error: Option<SearchError> = None;

        if self.profile.exact_precheck {
            if let Some(result) = self
                .exact_precheck(affiliation, &regions, active_only, &mut trace, &mut first_error)
                .await
            {
                return Ok(result);
            }
        }

        let nodes = match self.profile.segmentation {
            SegmentationMode::Graph => self.segmenter.segment(affiliation),
            SegmentationMode::Flat => self.segmenter.whole(affiliation),
        };
        trace.nodes = nodes.len();

        let tasks = self.plan(affiliation, &nodes);
        let outcomes = self.run(&tasks, active_only).await;

        let mut pools: Vec<Vec<CandidateMatch>> = vec![Vec::new(); nodes.len()];
        let mut acronym_pool: Vec<CandidateMatch> = Vec::new();
        for (task, outcome) in tasks.iter().zip(outcomes) {
            trace.queries_issued += 1;
            let hits = match outcome {
                Outcome::Hits(hits) => hits,
                Outcome::Failed(e) => {
                    trace.queries_failed += 1;
                    first_error.get_or_insert(e);
                    continue;
                }
                Outcome::TimedOut => {
                    trace.queries_timed_out += 1;
                    continue;
                }
            };
            let scored = self.score_hits(task, &hits, &regions);
            match task.node {
                Some(idx) => pools[idx].extend(scored),
                None => acronym_pool.extend(scored),
            }
        }

        if trace.queries_issued > 0 && trace.queries_failed == trace.queries_issued {
            if let Some(e) = first_error {
                return Err(MatchError::Backend(e));
            }
        }

        let raw_chosen = self.profile.raw_chosen();
        let mut chosen: Vec<CandidateMatch> = Vec::new();
        for (node, pool) in nodes.iter().zip(&pools) {
            let Some(candidate) = selection::choose(node.text.chars().count(), pool, raw_chosen) else {
                continue;
            };
            self.accept(candidate, &regions, &mut chosen);
        }
        if chosen.is_empty() {
            if let Some(candidate) = selection::choose(affiliation.chars().count(), &acronym_pool, raw_chosen) {
                self.accept(candidate, &regions, &mut chosen);
            }
        }

        let all_scored: Vec<CandidateMatch> = pools.into_iter().flatten().chain(acronym_pool).collect();
        trace.candidates_scored = all_scored.len();

        let items = ranker::rank(&chosen, all_scored, active_only, self.profile.max_results);
        debug!(
            nodes = trace.nodes,
            queries = trace.queries_issued,
            failed = trace.queries_failed,
            candidates = trace.candidates_scored,
            results = items.len(),
            chosen = items.first().filter(|c| c.is_chosen()).map(|c| c.organization_id()),
            "Affiliation matched"
        );

        Ok(MatchResult { items, trace })
    }

    /// Node queries in node then strategy order, followed by the acronym pass.
    fn plan(&self, affiliation: &str, nodes: &[SegmentNode]) -> Vec<Task> {
        let mut tasks: Vec<Task> = nodes
            .iter()
            .enumerate()
            .flat_map(|(idx, node)| {
                self.search
                    .plan(&self.profile.node_strategies, &node.text)
                    .into_iter()
                    .map(move |planned| Task {
                        node: Some(idx),
                        base: node.start(),
                        planned,
                    })
            })
            .collect();

        if self.profile.acronym_pass && !nodes.is_empty() {
            tasks.extend(self.search.plan_acronyms(affiliation).into_iter().map(|planned| Task {
                node: None,
                base: 0,
                planned,
            }));
        }
        tasks
    }

    /// Run every task with bounded concurrency. Outcomes come back in task
    /// order whatever order the queries finish in.
    async fn run(&self, tasks: &[Task], active_only: bool) -> Vec<Outcome> {
        let timeout = Duration::from_millis(self.profile.query_timeout_ms);
        let concurrency = self.profile.max_concurrent_queries.max(1);

        let queries: Vec<_> = tasks
            .iter()
            .map(|task| self.run_one(&task.planned, active_only, timeout))
            .collect();
        stream::iter(queries)
        .buffered(concurrency)
        .collect()
        .await
    }

    async fn run_one(&self, planned: &PlannedQuery, active_only: bool, timeout: Duration) -> Outcome {
        match tokio::time::timeout(timeout, self.search.search(planned, active_only)).await {
            Ok(Ok(hits)) => Outcome::Hits(hits),
            Ok(Err(e)) => {
                warn!(
                    strategy = %planned.strategy,
                    substring = %planned.substring,
                    error = %e,
                    "Candidate query failed"
                );
                Outcome::Failed(e)
            }
            Err(_) => {
                warn!(
                    strategy = %planned.strategy,
                    substring = %planned.substring,
                    timeout_ms = timeout.as_millis() as u64,
                    "Candidate query timed out"
                );
                Outcome::TimedOut
            }
        }
    }

    fn score_hits(&self, task: &Task, hits: &[SearchHit], regions: &RegionSet) -> Vec<CandidateMatch> {
        let floor = self.profile.raw_floor();
        let shift = task.base + task.planned.offset;
        hits.iter()
            .map(|hit| {
                scorer::score_candidate(
                    &task.planned.substring,
                    &hit.organization,
                    task.planned.strategy,
                    regions,
                    self.profile.comparison,
                )
            })
            .filter(|m| m.raw_score() >= floor)
            .map(|m| m.shifted(shift))
            .collect()
    }

    /// Region gate, then organization dedup across nodes.
    fn accept(&self, candidate: CandidateMatch, regions: &RegionSet, chosen: &mut Vec<CandidateMatch>) {
        if !in_regions(&candidate, regions) {
            debug!(
                organization = candidate.organization_id(),
                substring = candidate.substring(),
                "Chosen candidate rejected by region"
            );
            return;
        }
        if chosen
            .iter()
            .any(|c| c.organization_id() == candidate.organization_id())
        {
            return;
        }
        debug!(
            organization = candidate.organization_id(),
            substring = candidate.substring(),
            score = candidate.score(),
            strategy = %candidate.strategy(),
            "Candidate chosen for node"
        );
        chosen.push(candidate);
    }

    /// Quoted-phrase query over the whole affiliation. Returns a finished
    /// result when it yields a perfect, region-consistent match.
    async fn exact_precheck(
        &self,
        affiliation: &str,
        regions: &RegionSet,
        active_only: bool,
        trace: &mut MatchTrace,
        first_error: &mut Option<SearchError>,
    ) -> Option<MatchResult> {
        let planned = self
            .search
            .plan(&[Strategy::Exact], affiliation)
            .into_iter()
            .next()?;
        let timeout = Duration::from_millis(self.profile.query_timeout_ms);

        trace.queries_issued += 1;
        let hits = match self.run_one(&planned, active_only, timeout).await {
            Outcome::Hits(hits) => hits,
            Outcome::Failed(e) => {
                trace.queries_failed += 1;
                first_error.get_or_insert(e);
                return None;
            }
            Outcome::TimedOut => {
                trace.queries_timed_out += 1;
                return None;
            }
        };

        let task = Task {
            node: None,
            base: 0,
            planned,
        };
        let pool = self.score_hits(&task, &hits, regions);
        let candidate = selection::choose(affiliation.chars().count(), &pool, self.profile.raw_chosen())?;
        if candidate.score() < 1.0 || !in_regions(&candidate, regions) {
            return None;
        }

        trace.exact_match = true;
        trace.candidates_scored = pool.len();
        let items = ranker::rank(&[candidate], pool, active_only, self.profile.max_results);
        Some(MatchResult {
            items,
            trace: trace.clone(),
        })
    }
}

fn in_regions(candidate: &CandidateMatch, regions: &RegionSet) -> bool {
    regions.is_empty()
        || candidate
            .organization()
            .region()
            .is_some_and(|region| regions.contains(&region))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use index::{Organization, SearchQuery};
    use serde_json::{Value, json};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// In-memory backend answering by query text.
    #[derive(Default)]
    struct ScriptedBackend {
        responses: HashMap<String, Vec<Value>>,
        failing: HashSet<String>,
        fail_all: bool,
        delay: Option<Duration>,
        calls: Mutex<Vec<(Strategy, String)>>,
    }

    impl ScriptedBackend {
        fn respond(mut self, text: &str, docs: Vec<Value>) -> Self {
            self.responses.insert(text.to_string(), docs);
            self
        }

        fn fail_on(mut self, text: &str) -> Self {
            self.failing.insert(text.to_string());
            self
        }

        fn calls(&self) -> Vec<(Strategy, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchBackend for ScriptedBackend {
        async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError> {
            self.calls
                .lock()
                .unwrap()
                .push((query.strategy, query.text.clone()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_all || self.failing.contains(&query.text) {
                return Err(SearchError::Unavailable("connection refused".into()));
            }
            let docs = self.responses.get(&query.text).cloned().unwrap_or_default();
            Ok(docs
                .into_iter()
                .filter_map(|doc| Organization::from_document(None, doc))
                .map(|organization| SearchHit {
                    score: 10.0,
                    organization: Arc::new(organization),
                })
                .collect())
        }

        async fn ping(&self) -> Result<(), SearchError> {
            if self.fail_all {
                Err(SearchError::Unavailable("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    fn excellence() -> Value {
        json!({
            "id": "https://ror.org/00excel00",
            "status": "active",
            "names": [
                {"value": "University of Excellence", "types": ["ror_display", "label"]},
                {"value": "UOE", "types": ["acronym"]}
            ],
            "locations": [{"geonames_details": {"country_code": "GB"}}]
        })
    }

    fn creativity() -> Value {
        json!({
            "id": "https://ror.org/00creat00",
            "status": "active",
            "names": [{"value": "Creativity Instituto", "types": ["ror_display"]}],
            "locations": [{"geonames_details": {"country_code": "US"}}]
        })
    }

    fn matcher(backend: Arc<ScriptedBackend>, profile: MatchingProfile) -> Matcher {
        let gazetteer = Arc::new(Gazetteer::embedded().unwrap());
        Matcher::new(backend, gazetteer, profile)
    }

    fn ids(result: &MatchResult) -> Vec<&str> {
        result.items.iter().map(|c| c.organization_id()).collect()
    }

    #[tokio::test]
    async fn test_two_organizations_one_chosen() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .respond("university of excellence", vec![excellence()])
                .respond("creativity institute", vec![creativity()]),
        );
        let result = matcher(backend, MatchingProfile::default())
            .match_affiliation("University of Excellence, Creativity Institute", true)
            .await
            .unwrap();

        assert_eq!(ids(&result), vec!["https://ror.org/00excel00", "https://ror.org/00creat00"]);
        assert!(result.items[0].is_chosen());
        assert_eq!(result.items[0].score(), 1.0);
        assert!(!result.items[1].is_chosen());
        // "creativity instituto" against "creativity institute" is 95.0, above the 0.92 floor
        assert_eq!(result.items[1].score(), 0.95);
        assert!(result.items[1].raw_score() >= MatchingProfile::default().min_chosen_score * 100.0);
        assert_eq!(result.chosen().unwrap().organization_id(), "https://ror.org/00excel00");
        assert_eq!(result.trace.nodes, 3);
        assert_eq!(result.trace.queries_failed, 0);
    }

    #[tokio::test]
    async fn test_node_queries_follow_strategy_order() {
        let backend = Arc::new(ScriptedBackend::default());
        let profile = MatchingProfile {
            max_concurrent_queries: 1,
            ..MatchingProfile::default()
        };
        matcher(Arc::clone(&backend), profile)
            .match_affiliation("Excellence Institute", true)
            .await
            .unwrap();
        let calls = backend.calls();
        let strategies: Vec<Strategy> = calls.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            strategies,
            vec![Strategy::Phrase, Strategy::CommonTerms, Strategy::Fuzzy]
        );
        assert!(calls.iter().all(|(_, text)| text == "excellence institute"));
    }

    #[tokio::test]
    async fn test_country_alone_is_empty() {
        let backend = Arc::new(ScriptedBackend::default().respond("mexico", vec![excellence()]));
        let result = matcher(Arc::clone(&backend), MatchingProfile::default())
            .match_affiliation("Mexico", true)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(result.chosen().is_none());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_backend_down_is_an_error() {
        let backend = Arc::new(ScriptedBackend {
            fail_all: true,
            ..Default::default()
        });
        let m = matcher(backend, MatchingProfile::default());
        let err = m
            .match_affiliation("University of Excellence", true)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::Backend(SearchError::Unavailable(_))));
        assert!(m.health().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_affiliation() {
        let backend = Arc::new(ScriptedBackend::default());
        let err = matcher(Arc::clone(&backend), MatchingProfile::default())
            .match_affiliation("   ", true)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::MissingAffiliation));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_degrades() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .respond("university of excellence", vec![excellence()])
                .respond("creativity institute", vec![creativity()])
                .fail_on("creativity institute"),
        );
        let result = matcher(backend, MatchingProfile::default())
            .match_affiliation("University of Excellence, Creativity Institute", true)
            .await
            .unwrap();
        assert_eq!(ids(&result), vec!["https://ror.org/00excel00"]);
        assert!(result.items[0].is_chosen());
        assert_eq!(result.trace.queries_failed, 3);
    }

    #[tokio::test]
    async fn test_timeouts_contribute_nothing() {
        let backend = Arc::new(ScriptedBackend {
            delay: Some(Duration::from_millis(500)),
            ..ScriptedBackend::default().respond("university of excellence", vec![excellence()])
        });
        let profile = MatchingProfile {
            query_timeout_ms: 20,
            ..MatchingProfile::default()
        };
        let result = matcher(backend, profile)
            .match_affiliation("University of Excellence", true)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(result.trace.queries_timed_out > 0);
        assert_eq!(result.trace.queries_timed_out, result.trace.queries_issued);
    }

    #[tokio::test]
    async fn test_region_mismatch_is_not_chosen() {
        let backend = Arc::new(ScriptedBackend::default().respond("university of excellence", vec![excellence()]));
        let result = matcher(backend, MatchingProfile::default())
            .match_affiliation("University of Excellence, Paris, France", true)
            .await
            .unwrap();
        assert_eq!(ids(&result), vec!["https://ror.org/00excel00"]);
        assert!(result.chosen().is_none());
    }

    #[tokio::test]
    async fn test_acronym_pass_with_region() {
        let backend = Arc::new(ScriptedBackend::default().respond("UOE", vec![excellence()]));
        let m = matcher(backend, MatchingProfile::default());

        let result = m.match_affiliation("UOE, Cambridge, UK", true).await.unwrap();
        let chosen = result.chosen().unwrap();
        assert_eq!(chosen.organization_id(), "https://ror.org/00excel00");
        assert_eq!(chosen.strategy(), Strategy::Acronym);
        assert_eq!(chosen.score(), 1.0);

        // without a country the acronym alone stays below the chosen threshold
        let result = m.match_affiliation("UOE, Cambridge", true).await.unwrap();
        assert!(result.chosen().is_none());
        assert_eq!(result.items[0].score(), 0.9);
    }

    #[tokio::test]
    async fn test_exact_precheck_short_circuits() {
        let backend = Arc::new(ScriptedBackend::default().respond("University of Excellence", vec![excellence()]));
        let profile = MatchingProfile {
            exact_precheck: true,
            ..MatchingProfile::default()
        };
        let result = matcher(Arc::clone(&backend), profile)
            .match_affiliation("University of Excellence", true)
            .await
            .unwrap();
        let chosen = result.chosen().unwrap();
        assert_eq!(chosen.strategy(), Strategy::Exact);
        assert!(result.trace.exact_match);
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_single_search_profile() {
        let affiliation = "Dept. of Physics, University of Excellence";
        let backend = Arc::new(ScriptedBackend::default().respond(affiliation, vec![creativity(), excellence()]));
        let result = matcher(Arc::clone(&backend), MatchingProfile::single_search())
            .match_affiliation(affiliation, true)
            .await
            .unwrap();
        let chosen = result.chosen().unwrap();
        assert_eq!(chosen.organization_id(), "https://ror.org/00excel00");
        assert_eq!(chosen.strategy(), Strategy::SingleSearch);
        assert_eq!(backend.calls(), vec![(Strategy::SingleSearch, affiliation.to_string())]);
    }

    #[tokio::test]
    async fn test_inactive_candidates_filtered() {
        let mut inactive = creativity();
        inactive["status"] = json!("inactive");
        let backend = Arc::new(ScriptedBackend::default().respond("creativity institute", vec![inactive]));
        let m = matcher(backend, MatchingProfile::default());
        let active = m.match_affiliation("Creativity Institute", true).await.unwrap();
        assert!(active.is_empty());
        let all = m.match_affiliation("Creativity Institute", false).await.unwrap();
        assert_eq!(ids(&all), vec!["https://ror.org/00creat00"]);
    }
}
