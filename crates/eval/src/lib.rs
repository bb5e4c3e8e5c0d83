pub mod dataset;
pub mod evaluator;

pub use dataset::{AffiliationCase, CaseKind, default_dataset, load_dataset};
pub use evaluator::{EvaluationReport, Evaluator, Thresholds};
