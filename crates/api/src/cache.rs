use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::response::MatchingResponse;

/// In-process cache of rendered match responses.
pub struct Cache {
    responses: Arc<DashMap<String, MatchingResponse>>,
    max_entries: usize,
}

impl Cache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            responses: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    pub fn get(&self, profile: &str, active_only: bool, affiliation: &str) -> Option<MatchingResponse> {
        let key = Self::key(profile, active_only, affiliation);
        self.responses.get(&key).map(|r| r.value().clone())
    }

    pub fn set(&self, profile: &str, active_only: bool, affiliation: &str, response: MatchingResponse) {
        if self.max_entries == 0 {
            return;
        }
        if self.responses.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self
                .responses
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.responses.remove(&key);
            }
        }
        self.responses
            .insert(Self::key(profile, active_only, affiliation), response);
    }

    fn key(profile: &str, active_only: bool, affiliation: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(profile.as_bytes());
        hasher.update([0u8, active_only as u8, 0u8]);
        hasher.update(affiliation.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            responses_cached: self.responses.len(),
            max_entries: self.max_entries,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub responses_cached: usize,
    pub max_entries: usize,
}
