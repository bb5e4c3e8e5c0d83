use serde::{Deserialize, Serialize};
use std::fmt;

/// Query shape used to retrieve candidates, also reported as the
/// `matching_type` of every scored candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "PHRASE")]
    Phrase,
    #[serde(rename = "COMMON TERMS")]
    CommonTerms,
    #[serde(rename = "FUZZY")]
    Fuzzy,
    #[serde(rename = "HEURISTICS")]
    Heuristics,
    #[serde(rename = "ACRONYM")]
    Acronym,
    #[serde(rename = "EXACT")]
    Exact,
    #[serde(rename = "SINGLE SEARCH")]
    SingleSearch,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Phrase => "PHRASE",
            Self::CommonTerms => "COMMON TERMS",
            Self::Fuzzy => "FUZZY",
            Self::Heuristics => "HEURISTICS",
            Self::Acronym => "ACRONYM",
            Self::Exact => "EXACT",
            Self::SingleSearch => "SINGLE SEARCH",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
