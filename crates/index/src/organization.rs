use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const STATUS_ACTIVE: &str = "active";
pub const NAME_TYPE_ACRONYM: &str = "acronym";

/// One name of an organization with its role tags ("ror_display", "label",
/// "alias", "acronym", ...).
#[derive(Debug, Clone, PartialEq)]
pub struct NameVariant {
    pub value: String,
    pub types: Vec<String>,
}

impl NameVariant {
    pub fn is_acronym(&self) -> bool {
        self.types.iter().any(|t| t == NAME_TYPE_ACRONYM)
    }
}

/// Registry organization as returned by the search backend.
///
/// `source` keeps the full document so the API layer can return it untouched.
#[derive(Debug, Clone)]
pub struct Organization {
    pub id: String,
    pub status: String,
    pub names: Vec<NameVariant>,
    pub country_code: Option<String>,
    pub source: Value,
}

impl Organization {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    /// Names usable for fuzzy comparison.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .filter(|n| !n.is_acronym())
            .map(|n| n.value.as_str())
    }

    pub fn acronyms(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .filter(|n| n.is_acronym())
            .map(|n| n.value.as_str())
    }

    /// Region bucket of the organization's primary location.
    pub fn region(&self) -> Option<String> {
        self.country_code.as_deref().map(geo::to_region)
    }

    /// Build from a hit's `_id` and `_source`. Returns `None` when the
    /// document lacks an identifier or a names list.
    pub fn from_document(hit_id: Option<&str>, source: Value) -> Option<Self> {
        let raw: RawSource = serde_json::from_value(source.clone()).ok()?;
        let id = raw.id.or_else(|| hit_id.map(str::to_string))?;
        let names = raw
            .names?
            .into_iter()
            .filter_map(|n| {
                n.value.map(|value| NameVariant {
                    value,
                    types: n.types,
                })
            })
            .collect();
        let country_code = raw
            .locations
            .into_iter()
            .next()
            .and_then(|l| l.geonames_details)
            .and_then(|g| g.country_code);

        Some(Self {
            id,
            status: raw.status.unwrap_or_default(),
            names,
            country_code,
            source,
        })
    }
}

/// A scored search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Backend relevance score.
    pub score: f64,
    pub organization: Arc<Organization>,
}

#[derive(Deserialize)]
struct RawSource {
    id: Option<String>,
    status: Option<String>,
    names: Option<Vec<RawName>>,
    #[serde(default)]
    locations: Vec<RawLocation>,
}

#[derive(Deserialize)]
struct RawName {
    value: Option<String>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Deserialize)]
struct RawLocation {
    geonames_details: Option<RawGeonames>,
}

#[derive(Deserialize)]
struct RawGeonames {
    country_code: Option<String>,
}
