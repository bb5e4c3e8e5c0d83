use anyhow::{Context, Result, bail};
use eval::{EvaluationReport, Evaluator, Thresholds, default_dataset, load_dataset};
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    println!("=== Affiliation Matching Evaluation ===\n");

    let api_url = std::env::var("EVAL_API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let all_status = std::env::var("EVAL_ALL_STATUS").is_ok_and(|v| v.eq_ignore_ascii_case("true"));
    let output = std::env::var("EVAL_OUTPUT").unwrap_or_else(|_| "evaluation_results.json".to_string());
    let thresholds = Thresholds::default().with_overrides(|key| std::env::var(key).ok());

    let cases = match std::env::var("EVAL_DATASET") {
        Ok(path) => load_dataset(&PathBuf::from(path))?,
        Err(_) => default_dataset()?,
    };
    println!("Dataset: {} affiliations\n", cases.len());

    let evaluator = Evaluator::new(api_url, Duration::from_secs(30))?.with_all_status(all_status);
    let report = evaluator.run(&cases).await;

    print_report(&report);

    let report_json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&output, report_json).with_context(|| format!("Failed to write {}", output))?;
    println!("\nResults saved to {}", output);

    let violations = thresholds.violations(&report);
    if !violations.is_empty() {
        bail!("evaluation below minimum: {}", violations.join("; "));
    }
    Ok(())
}

fn print_report(report: &EvaluationReport) {
    println!("=== RESULTS ===\n");
    println!("  Cases: {} ({} request errors)", report.total_cases, report.request_errors);
    println!("  Accuracy: {:.3} ({}/{})", report.accuracy, report.correct, report.total_cases);
    println!("  Precision: {:.3}", report.precision);
    println!("  Recall: {:.3}", report.recall);
    println!("  Avg Latency: {:.0} ms", report.avg_latency_ms);
    println!("  P50 Latency: {:.0} ms", report.p50_latency_ms);
    println!("  P95 Latency: {:.0} ms", report.p95_latency_ms);

    println!("\nBy kind:");
    for score in &report.by_kind {
        println!("  {:?}: {:.3} over {}", score.kind, score.accuracy, score.count);
    }

    if !report.misses.is_empty() {
        println!("\nMisses:");
        for miss in &report.misses {
            println!(
                "  {} expected {:?} got {:?}",
                miss.affiliation, miss.expected, miss.predicted
            );
        }
    }
}
