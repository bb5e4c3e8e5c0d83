use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_DATASET: &str = include_str!("../data/affiliations.json");

/// One labelled affiliation string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffiliationCase {
    pub affiliation: String,
    /// Organization IDs the affiliation should resolve to. Empty means no match is expected.
    #[serde(default)]
    pub expected_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseKind {
    NoMatch,
    SingleOrganization,
    MultipleOrganizations,
}

impl AffiliationCase {
    pub fn kind(&self) -> CaseKind {
        match self.expected_ids.len() {
            0 => CaseKind::NoMatch,
            1 => CaseKind::SingleOrganization,
            _ => CaseKind::MultipleOrganizations,
        }
    }
}

/// The small labelled set shipped with the crate.
pub fn default_dataset() -> Result<Vec<AffiliationCase>> {
    parse_dataset(DEFAULT_DATASET).context("Embedded dataset is invalid")
}

pub fn load_dataset(path: &Path) -> Result<Vec<AffiliationCase>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    parse_dataset(&raw).with_context(|| format!("Invalid dataset {}", path.display()))
}

pub fn parse_dataset(raw: &str) -> Result<Vec<AffiliationCase>> {
    let cases: Vec<AffiliationCase> = serde_json::from_str(raw)?;
    for (i, case) in cases.iter().enumerate() {
        if case.affiliation.trim().is_empty() {
            bail!("case {} has an empty affiliation", i);
        }
    }
    Ok(cases)
}
