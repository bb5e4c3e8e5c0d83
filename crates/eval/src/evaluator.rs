use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::dataset::{AffiliationCase, CaseKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub total_cases: usize,
    pub correct: usize,
    pub request_errors: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub by_kind: Vec<KindScore>,
    /// Cases whose prediction differed from the expected set.
    pub misses: Vec<CaseResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindScore {
    pub kind: CaseKind,
    pub accuracy: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub affiliation: String,
    pub kind: CaseKind,
    pub expected: BTreeSet<String>,
    pub predicted: BTreeSet<String>,
    pub latency_ms: f64,
    pub failed: bool,
}

impl CaseResult {
    pub fn is_correct(&self) -> bool {
        !self.failed && self.expected == self.predicted
    }

    fn true_positives(&self) -> usize {
        self.predicted.intersection(&self.expected).count()
    }
}

/// Minimum scores a run must reach.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_accuracy: f64,
    pub min_precision: f64,
    pub min_recall: f64,
}

impl Thresholds {
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EVAL_MIN_ACCURACY").and_then(|v| v.parse().ok()) {
            self.min_accuracy = v;
        }
        if let Some(v) = lookup("EVAL_MIN_PRECISION").and_then(|v| v.parse().ok()) {
            self.min_precision = v;
        }
        if let Some(v) = lookup("EVAL_MIN_RECALL").and_then(|v| v.parse().ok()) {
            self.min_recall = v;
        }
        self
    }

    /// Descriptions of every metric below its minimum.
    pub fn violations(&self, report: &EvaluationReport) -> Vec<String> {
        [
            ("accuracy", report.accuracy, self.min_accuracy),
            ("precision", report.precision, self.min_precision),
            ("recall", report.recall, self.min_recall),
        ]
        .into_iter()
        .filter(|(_, value, min)| value < min)
        .map(|(name, value, min)| format!("{} {:.3} below minimum {:.3}", name, value, min))
        .collect()
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    items: Vec<ApiItem>,
}

#[derive(Deserialize)]
struct ApiItem {
    chosen: bool,
    organization: Value,
}

/// Runs a labelled dataset against a running matcher API.
pub struct Evaluator {
    client: reqwest::Client,
    api_base_url: String,
    all_status: bool,
}

impl Evaluator {
    pub fn new(api_base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            all_status: false,
        })
    }

    /// Match against organizations of every status, not only active ones.
    pub fn with_all_status(mut self, all_status: bool) -> Self {
        self.all_status = all_status;
        self
    }

    pub async fn run(&self, cases: &[AffiliationCase]) -> EvaluationReport {
        info!(cases = cases.len(), api = %self.api_base_url, "Running evaluation");

        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let start = Instant::now();
            let prediction = self.predict(&case.affiliation).await;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            let (predicted, failed) = match prediction {
                Ok(ids) => (ids, false),
                Err(e) => {
                    warn!(affiliation = %case.affiliation, error = %e, "Match request failed");
                    (BTreeSet::new(), true)
                }
            };
            debug!(affiliation = %case.affiliation, ?predicted, latency_ms, "Case evaluated");

            results.push(CaseResult {
                affiliation: case.affiliation.clone(),
                kind: case.kind(),
                expected: case.expected_ids.iter().cloned().collect(),
                predicted,
                latency_ms,
                failed,
            });
        }

        compute_report(results)
    }

    async fn predict(&self, affiliation: &str) -> Result<BTreeSet<String>> {
        let mut params = vec![("affiliation", affiliation)];
        if self.all_status {
            params.push(("all_status", "true"));
        }

        let response = self
            .client
            .get(format!("{}/organizations", self.api_base_url))
            .query(&params)
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse = response.json().await?;
        Ok(chosen_ids(&body))
    }
}

fn chosen_ids(response: &ApiResponse) -> BTreeSet<String> {
    response
        .items
        .iter()
        .filter(|item| item.chosen)
        .filter_map(|item| item.organization["id"].as_str())
        .map(str::to_string)
        .collect()
}

fn scores_by_kind(results: &[CaseResult]) -> Vec<KindScore> {
    let mut by_kind: HashMap<CaseKind, (usize, usize)> = HashMap::new();
    for result in results {
        let entry = by_kind.entry(result.kind).or_default();
        entry.0 += result.is_correct() as usize;
        entry.1 += 1;
    }

    let mut scores: Vec<KindScore> = by_kind
        .into_iter()
        .map(|(kind, (correct, count))| KindScore {
            kind,
            accuracy: correct as f64 / count as f64,
            count,
        })
        .collect();
    scores.sort_by_key(|s| s.kind as u8);
    scores
}

/// Aggregate per-case results. Precision and recall are pooled over organization IDs.
pub fn compute_report(results: Vec<CaseResult>) -> EvaluationReport {
    let total_cases = results.len();
    let correct = results.iter().filter(|r| r.is_correct()).count();
    let request_errors = results.iter().filter(|r| r.failed).count();

    let true_positives: usize = results.iter().map(CaseResult::true_positives).sum();
    let predicted: usize = results.iter().map(|r| r.predicted.len()).sum();
    let expected: usize = results.iter().map(|r| r.expected.len()).sum();

    let mut latencies: Vec<f64> = results.iter().map(|r| r.latency_ms).collect();
    latencies.sort_by(f64::total_cmp);

    let by_kind = scores_by_kind(&results);
    let misses = results.into_iter().filter(|r| !r.is_correct()).collect();

    EvaluationReport {
        total_cases,
        correct,
        request_errors,
        accuracy: ratio(correct, total_cases),
        precision: ratio(true_positives, predicted),
        recall: ratio(true_positives, expected),
        avg_latency_ms: mean(&latencies),
        p50_latency_ms: percentile(&latencies, 50),
        p95_latency_ms: percentile(&latencies, 95),
        by_kind,
        misses,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn percentile(sorted_data: &[f64], p: usize) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    let index = (p as f64 / 100.0 * sorted_data.len() as f64) as usize;
    sorted_data[index.min(sorted_data.len() - 1)]
}
