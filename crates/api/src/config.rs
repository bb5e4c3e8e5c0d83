use index::RetryPolicy;
use matching::MatchingProfile;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub retry: RetryPolicy,
    pub cache: CacheConfig,
    pub geo: GeoConfig,
    /// Matching preset name ("multi" or "single").
    pub profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub url: String,
    pub index: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoConfig {
    /// GeoNames `cities15000.txt` dump replacing the embedded city table.
    pub cities_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "0.0.0.0:3000".to_string(),
            },
            search: SearchConfig {
                url: "http://localhost:9200".to_string(),
                index: "organizations".to_string(),
                request_timeout_secs: 10,
            },
            retry: RetryPolicy::new(2, 100, 1_000),
            cache: CacheConfig {
                enabled: true,
                max_entries: 10_000,
            },
            geo: GeoConfig::default(),
            profile: "multi".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; unparsable values keep the default.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MATCH_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("ES_URL") {
            self.search.url = v;
        }
        if let Some(v) = lookup("ES_INDEX") {
            self.search.index = v;
        }
        if let Some(v) = lookup("ES_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.search.request_timeout_secs = v;
        }
        if let Some(v) = lookup("MATCH_PROFILE") {
            self.profile = v;
        }
        if let Some(v) = lookup("MATCH_CACHE_ENABLED").and_then(|v| parse_bool(&v)) {
            self.cache.enabled = v;
        }
        if let Some(v) = lookup("MATCH_CACHE_MAX_ENTRIES").and_then(|v| v.parse().ok()) {
            self.cache.max_entries = v;
        }
        if let Some(v) = lookup("GEO_CITIES_PATH").filter(|v| !v.trim().is_empty()) {
            self.geo.cities_path = Some(v);
        }
        if let Some(v) = lookup("SEARCH_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.retry.max_retries = v;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.search.request_timeout_secs)
    }

    /// Resolve the configured matching preset.
    pub fn matching_profile(&self) -> anyhow::Result<MatchingProfile> {
        MatchingProfile::by_name(&self.profile)
            .ok_or_else(|| anyhow::anyhow!("unknown matching profile '{}'", self.profile))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
